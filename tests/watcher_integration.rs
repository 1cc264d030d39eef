//! End-to-end recovery through a watcher and real background polling.

use breakwater::testing::{wait_until, CountingRetry, ListenerEvent, RecordingListener, ResumeFlag};
use breakwater::{assert_cleared, assert_raised, ErrorState, TokioRetryScheduler, Watcher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

struct ShutdownOnDrop(Watcher);

impl Drop for ShutdownOnDrop {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

#[test]
fn successful_retry_cancels_retry_and_calls_resume() {
    let retry = CountingRetry::new(1);
    let flag = ResumeFlag::new();
    let mut watcher = Watcher::new();
    watcher
        .register(
            ErrorState::builder(1, "error", retry.clone())
                .delay(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .unwrap();
    let watcher = ShutdownOnDrop(watcher);

    watcher.0.signal_with(1, flag.resume()).unwrap();

    assert!(wait_until(WAIT, || flag.is_resumed()));
    assert_cleared!(watcher.0.get(1).unwrap());
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(retry.calls(), 1);
}

#[test]
fn unsuccessful_retry_schedules_another_retry() {
    let retry = CountingRetry::new(3);
    let calls_at_resume = Arc::new(AtomicU32::new(0));
    let mut watcher = Watcher::new();
    watcher
        .register(
            ErrorState::builder(2, "error", retry.clone())
                .delay(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .unwrap();
    let watcher = ShutdownOnDrop(watcher);

    let observed = calls_at_resume.clone();
    let probe = retry.clone();
    watcher
        .0
        .signal_with(2, move || observed.store(probe.calls(), Ordering::SeqCst))
        .unwrap();
    assert_raised!(watcher.0.get(2).unwrap());

    assert!(wait_until(WAIT, || calls_at_resume.load(Ordering::SeqCst) > 0));
    assert_eq!(calls_at_resume.load(Ordering::SeqCst), 3);
    assert_cleared!(watcher.0.get(2).unwrap());
    assert_eq!(retry.calls(), 3);
}

#[test]
fn error_states_recover_independently() {
    let pool = TokioRetryScheduler::shared().unwrap();
    let listener = RecordingListener::new();
    let quick = CountingRetry::new(2);
    let stuck = CountingRetry::never();
    let mut watcher = Watcher::new();
    watcher
        .register(
            ErrorState::builder(1, "quick to recover", quick.clone())
                .delay(Duration::from_millis(5))
                .listener(listener.clone())
                .scheduler(pool.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    watcher
        .register(
            ErrorState::builder(2, "stays down", stuck.clone())
                .delay(Duration::from_millis(5))
                .listener(listener.clone())
                .scheduler(pool.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    let watcher = ShutdownOnDrop(watcher);

    watcher.0.signal(2).unwrap();
    watcher.0.signal(1).unwrap();

    assert!(wait_until(WAIT, || !watcher.0.get(1).unwrap().is_raised()));
    assert!(stuck.calls() >= 1);
    let raised: Vec<_> = watcher.0.raised().map(ErrorState::id).collect();
    assert_eq!(raised, vec![2]);

    let events = listener.events();
    assert!(events.contains(&ListenerEvent::Raised(1)));
    assert!(events.contains(&ListenerEvent::Cleared(1)));
    assert!(!events.contains(&ListenerEvent::Cleared(2)));
}

#[test]
fn repeated_signals_while_raised_resume_everyone_once() {
    let gate = Arc::new(AtomicU32::new(0));
    let probe_gate = gate.clone();
    let mut watcher = Watcher::new();
    watcher
        .register(
            ErrorState::builder(5, "gated", move || probe_gate.load(Ordering::SeqCst) > 0)
                .delay(Duration::from_millis(5))
                .build()
                .unwrap(),
        )
        .unwrap();
    let watcher = ShutdownOnDrop(watcher);

    let resumed = Arc::new(AtomicU32::new(0));
    for _ in 0..5 {
        let resumed = resumed.clone();
        watcher
            .0
            .signal_with(5, move || {
                resumed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    assert_raised!(watcher.0.get(5).unwrap(), 5);

    gate.store(1, Ordering::SeqCst);

    assert!(wait_until(WAIT, || resumed.load(Ordering::SeqCst) == 5));
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(resumed.load(Ordering::SeqCst), 5);
    assert_cleared!(watcher.0.get(5).unwrap());
}
