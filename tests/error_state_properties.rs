//! Property-based tests for error-state counting and notification.

use breakwater::testing::{RecordingListener, RecordingScheduler};
use breakwater::ErrorState;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

fn recorded_state() -> (ErrorState, RecordingListener, Arc<RecordingScheduler>) {
    let listener = RecordingListener::new();
    let scheduler = Arc::new(RecordingScheduler::new());
    let state = ErrorState::builder(1, "error", || false)
        .listener(listener.clone())
        .scheduler(scheduler.clone())
        .build()
        .unwrap();
    (state, listener, scheduler)
}

proptest! {
    #[test]
    fn prop_n_raises_transition_once(n in 1u64..200) {
        let (state, listener, scheduler) = recorded_state();

        for _ in 0..n {
            state.raise();
        }

        prop_assert!(state.is_raised());
        prop_assert_eq!(state.raised_count(), n);
        prop_assert_eq!(listener.raises(), 1);
        prop_assert_eq!(scheduler.schedule_count(), 1);
    }

    #[test]
    fn prop_clear_runs_resumes_in_order_once(resumes in 1usize..50, extra_clears in 0usize..3) {
        let (state, listener, _) = recorded_state();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..resumes {
            let order = order.clone();
            state.raise_with(move || order.lock().unwrap().push(n));
        }
        for _ in 0..=extra_clears {
            state.clear();
        }

        prop_assert_eq!(order.lock().unwrap().clone(), (0..resumes).collect::<Vec<_>>());
        prop_assert_eq!(listener.clears(), 1);
        prop_assert_eq!(state.raised_count(), 0);
    }

    #[test]
    fn prop_episodes_count_cleared_to_raised_transitions(episodes in 1u64..20, raises in 1u64..5) {
        let (state, listener, scheduler) = recorded_state();

        for _ in 0..episodes {
            for _ in 0..raises {
                state.raise();
            }
            state.clear();
        }

        prop_assert_eq!(state.episode(), episodes);
        prop_assert_eq!(listener.raises() as u64, episodes);
        prop_assert_eq!(listener.clears() as u64, episodes);
        prop_assert_eq!(scheduler.schedule_count() as u64, episodes);
    }
}
