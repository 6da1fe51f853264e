use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use matchpulse::policy::RefreshPolicy;
use matchpulse::scheduler::RefreshScheduler;

#[test]
fn default_table_matches_the_documented_tiers() {
    let policy = RefreshPolicy::default();
    assert_eq!(policy.interval_for(0), Duration::from_secs(30));
    assert_eq!(policy.interval_for(1), Duration::from_millis(15_000));
    assert_eq!(policy.interval_for(9), Duration::from_millis(15_000));
    assert_eq!(policy.interval_for(10), Duration::from_millis(3_000));
    assert_eq!(policy.interval_for(19), Duration::from_millis(3_000));
    assert_eq!(policy.interval_for(20), Duration::from_millis(2_500));
    assert_eq!(policy.interval_for(49), Duration::from_millis(2_500));
    assert_eq!(policy.interval_for(50), Duration::from_millis(2_000));
    assert_eq!(policy.interval_for(100), Duration::from_millis(1_500));
    assert_eq!(policy.interval_for(5000), Duration::from_millis(1_500));
}

#[test]
fn going_live_moves_off_the_idle_interval() {
    // The spec scenario: live count jumps 0 -> 12, cadence jumps
    // 30000 ms -> 3000 ms.
    let policy = RefreshPolicy::default();
    let before = policy.interval_for(0);
    let after = policy.interval_for(12);
    assert_eq!(before, Duration::from_millis(30_000));
    assert_eq!(after, Duration::from_millis(3_000));
}

#[test]
fn live_count_change_retunes_a_running_scheduler() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let policy = RefreshPolicy::new(
        Duration::from_secs(60),
        vec![(1, Duration::from_millis(10))],
    )
    .expect("valid policy");

    let mut scheduler = RefreshScheduler::start(policy, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // Idle: nothing should fire on a 60 s cadence.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    // A match goes live; the timer reschedules immediately.
    scheduler.update_live_count(1);
    std::thread::sleep(Duration::from_millis(100));
    assert!(ticks.load(Ordering::SeqCst) >= 3);

    // Everything ends; back to the idle cadence.
    scheduler.update_live_count(0);
    let settled = ticks.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(60));
    assert!(ticks.load(Ordering::SeqCst) <= settled + 1);

    scheduler.stop();
}

#[test]
fn teardown_leaves_no_dangling_timer() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let policy = RefreshPolicy::new(
        Duration::from_millis(10),
        vec![(1, Duration::from_millis(10))],
    )
    .expect("valid policy");

    let mut scheduler = RefreshScheduler::start(policy, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    std::thread::sleep(Duration::from_millis(40));
    scheduler.stop();

    let after_stop = ticks.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
}

#[test]
fn non_monotonic_tables_are_rejected_at_construction() {
    assert!(
        RefreshPolicy::new(
            Duration::from_secs(30),
            vec![
                (1, Duration::from_secs(15)),
                (10, Duration::from_secs(20)),
            ],
        )
        .is_err()
    );
    assert!(
        RefreshPolicy::new(
            Duration::from_secs(30),
            vec![
                (10, Duration::from_secs(5)),
                (5, Duration::from_secs(4)),
            ],
        )
        .is_err()
    );
}
