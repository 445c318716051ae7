mod util;
use util::*;

use dist_la::la::balanced_range;
use dist_la::prelude::*;
use serial_test::serial;

fn factory(comm: RayonComm, instrument: bool) -> VectorFactory<RayonComm> {
    VectorFactory::from_config(
        comm,
        LinalgConfig {
            backend: BackendKind::Dense,
            instrument,
        },
    )
}

#[test]
#[serial]
fn disabled_instrumentation_records_nothing() {
    let _ = list_timings(TimingClear::Clear);
    run_ranks(2, |c| {
        let range = balanced_range(c.rank(), c.size(), 20);
        let mut v = factory(c, false).create_vector();
        v.init(range).unwrap();
        v.gather(&[0, 19]).unwrap();
    });
    assert!(timing("la: create partition", TimingClear::Keep).is_err());
    assert!(timing("la: gather", TimingClear::Keep).is_err());
}

#[test]
#[serial]
fn enabled_instrumentation_times_explicit_partition() {
    let _ = list_timings(TimingClear::Clear);
    run_ranks(3, |c| {
        let range = balanced_range(c.rank(), c.size(), 20);
        let mut v = factory(c, true).create_vector();
        v.init(range).unwrap();
    });
    assert_eq!(
        timing("la: create partition", TimingClear::Clear).unwrap().count,
        3
    );
}
