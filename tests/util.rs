#![allow(dead_code)]
use dist_la::comm::RayonComm;
use dist_la::la::BackendKind;

/// Backends exercised by every test.
pub const ALL_BACKENDS: [BackendKind; 3] = [BackendKind::Dense, BackendKind::Petsc, BackendKind::Tpetra];

/// Backends that support gather and redistribution.
pub const GATHER_BACKENDS: [BackendKind; 2] = [BackendKind::Dense, BackendKind::Petsc];

/// Run `f` once per rank of a fresh `n`-rank thread group; results in rank order.
pub fn run_ranks<R: Send>(n: usize, f: impl Fn(RayonComm) -> R + Sync) -> Vec<R> {
    let comms = RayonComm::world(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let f = &f;
                s.spawn(move || f(c))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

/// Group sizes covered by the parallel tests.
pub fn rank_counts() -> impl Iterator<Item = usize> {
    1..=4
}
