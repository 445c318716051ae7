use std::thread::sleep;
use std::time::Duration;

use dist_la::la_error::LinalgError;
use dist_la::timing::{Timed, TimedPhase, Timer, TimingClear, list_timings, timed, timing};
use serial_test::serial;

fn sleep_ms(ms: u64) {
    sleep(Duration::from_millis(ms));
}

#[test]
#[serial]
fn context_manager_style_timer() {
    let task = "test_context_manager_named";
    {
        let t = Timer::new(task);
        sleep_ms(50);
        assert!(t.elapsed().wall >= 0.05);
    }
    let entry = timing(task, TimingClear::Clear).unwrap();
    assert_eq!(entry.count, 1);
    assert!(entry.wall >= 0.05);
    assert!(entry.user >= 0.0 && entry.system >= 0.0);
}

#[test]
#[serial]
fn anonymous_timer_is_not_listed() {
    let before = list_timings(TimingClear::Keep).len();
    {
        let t = Timer::anonymous();
        sleep_ms(10);
        assert!(t.elapsed().wall >= 0.01);
    }
    assert_eq!(list_timings(TimingClear::Keep).len(), before);
}

#[test]
#[serial]
fn decorated_function_records_each_call() {
    let task = "test_decorator_timer";
    let f: Timed<_> = timed(task, |ms: u64| {
        sleep_ms(ms);
        ms * 2
    });
    assert!(matches!(
        timing(task, TimingClear::Keep),
        Err(LinalgError::UnknownTask(_))
    ));
    assert_eq!(f.phase(), TimedPhase::Unarmed);

    sleep_ms(50);
    assert_eq!(f.call(30), 60);
    sleep_ms(50);
    assert_eq!(f.phase(), TimedPhase::Idle);

    let entry = timing(task, TimingClear::Keep).unwrap();
    assert_eq!(entry.count, 1);
    assert!(entry.wall >= 0.03 && entry.wall < 0.1);

    f.call(10);
    assert_eq!(timing(task, TimingClear::Clear).unwrap().count, 2);
}

#[test]
#[serial]
fn clearing_removes_entry() {
    let task = "test_clear_timing";
    drop(Timer::new(task));
    assert!(timing(task, TimingClear::Clear).is_ok());
    assert!(timing(task, TimingClear::Keep).is_err());
}

#[test]
#[serial]
fn explicit_stop_and_restart() {
    let task = "test_stop_restart";
    let mut t = Timer::new(task);
    sleep_ms(20);
    let first = t.stop();
    assert!(!t.is_running());
    assert!(first.wall >= 0.02);
    t.start();
    sleep_ms(20);
    t.stop();
    let entry = timing(task, TimingClear::Clear).unwrap();
    assert_eq!(entry.count, 2);
    assert!(entry.wall >= 0.04);
}
