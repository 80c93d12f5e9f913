// Purpose: Scenarios that hang by design, observed through the timeout harness.
//
// Stuck threads stay parked after each test; the test process ends them.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hazard_scenarios::config::LivelockConfig;
use hazard_scenarios::harness::{run_with_timeout, Outcome, RunOptions, Verdict, TIMEOUT_EXIT_CODE};
use hazard_scenarios::scenarios::{DeadlockMutex, DeadlockSem, Livelock};
use hazard_sync::{EventStatus, HeldLock, SyncOp};

fn options(timeout: Duration) -> RunOptions {
    RunOptions { timeout, profile: true }
}

fn held(thread: &str, lock: &str) -> HeldLock {
    HeldLock {
        thread: thread.to_owned(),
        lock: lock.to_owned(),
    }
}

#[test]
fn test_mutex_deadlock_blocks_both_threads_in_second_acquire() {
    let run = run_with_timeout(Arc::new(DeadlockMutex), &options(Duration::from_secs(2))).unwrap();
    assert_eq!(run.exit_code(), TIMEOUT_EXIT_CODE);
    assert_eq!(run.verdict(), Verdict::AsDesigned);

    let Outcome::TimedOut { pending, held: locks, aborted } = &run.outcome else {
        panic!("deadlock_mutex completed");
    };
    let acquires: Vec<_> = pending
        .iter()
        .filter(|e| e.op == SyncOp::LockAcquire)
        .map(|e| (e.thread.as_str(), e.object.as_str()))
        .collect();
    assert_eq!(acquires.len(), 2);
    assert!(acquires.contains(&("A", "m2")));
    assert!(acquires.contains(&("B", "m1")));

    assert_eq!(locks.len(), 2);
    assert!(locks.contains(&held("A", "m1")));
    assert!(locks.contains(&held("B", "m2")));

    // main is stuck joining A, so three events were aborted
    assert!(pending.iter().any(|e| e.thread == "main" && e.op == SyncOp::ThreadJoin));
    assert_eq!(*aborted, pending.len());
    assert!(run
        .profile
        .events()
        .iter()
        .filter(|e| e.status == EventStatus::Aborted)
        .all(|e| matches!(e.op, SyncOp::LockAcquire | SyncOp::ThreadJoin)));
}

#[test]
fn test_semaphore_deadlock_blocks_without_locks() {
    let run = run_with_timeout(Arc::new(DeadlockSem), &options(Duration::from_millis(500))).unwrap();
    assert_eq!(run.verdict(), Verdict::AsDesigned);

    let Outcome::TimedOut { pending, held: locks, .. } = &run.outcome else {
        panic!("deadlock_sem completed");
    };
    let waits: Vec<_> = pending
        .iter()
        .filter(|e| e.op == SyncOp::SemWait)
        .map(|e| (e.thread.as_str(), e.object.as_str()))
        .collect();
    assert_eq!(waits.len(), 2);
    assert!(waits.contains(&("A", "sem1")));
    assert!(waits.contains(&("B", "sem2")));
    assert!(locks.is_empty());
    assert!(!run.profile.occurrences().contains_key(&SyncOp::LockAcquire));
}

#[test]
fn test_livelock_threads_keep_polling() {
    let livelock = Livelock::from_config(&LivelockConfig {
        backoff_ms: 10,
        attempt_limit: None,
    });
    let attempts = livelock.attempts();
    let run = run_with_timeout(Arc::new(livelock), &options(Duration::from_millis(500))).unwrap();
    assert_eq!(run.verdict(), Verdict::AsDesigned);

    let Outcome::TimedOut { pending, held: locks, .. } = &run.outcome else {
        panic!("livelock completed");
    };
    // not blocked in any acquire; each role still holds its first lock
    assert!(!pending
        .iter()
        .any(|e| e.op == SyncOp::LockAcquire && (e.thread == "A" || e.thread == "B")));
    assert!(locks.contains(&held("A", "m1")));
    assert!(locks.contains(&held("B", "m2")));

    let (a1, b1) = attempts.snapshot();
    assert!(a1 > 0 && b1 > 0);
    thread::sleep(Duration::from_millis(200));
    let (a2, b2) = attempts.snapshot();
    assert!(a2 > a1, "A stopped polling at {}", a1);
    assert!(b2 > b1, "B stopped polling at {}", b1);

    let tries = run.profile.occurrences().get(&SyncOp::LockTryAcquire).copied().unwrap_or(0);
    assert!(tries as u64 >= a1 + b1);
}

#[test]
fn test_livelock_with_attempt_limit_completes_with_a_starved_role() {
    let livelock = Livelock::from_config(&LivelockConfig {
        backoff_ms: 1,
        attempt_limit: Some(10),
    });
    let run = run_with_timeout(Arc::new(livelock), &options(Duration::from_secs(5))).unwrap();

    let Outcome::Completed(report) = &run.outcome else {
        panic!("bounded livelock did not complete");
    };
    assert!(report.values.values().any(|v| v == "starved after 10 attempts"));
    assert!(matches!(run.verdict(), Verdict::Unexpected(_)));
}
