//! Fuzz target for the lifecycle register
//!
//! Applies arbitrary command sequences the way the application thread does:
//! `transition` in pre-exec, `settle` in post-exec.
//!
//! # Invariants
//!
//! - `destroy_requested` is set exactly from the first `Destroy` onward
//! - Once destroyed the state never changes
//! - `SaveState` clears `state_saved` until it is settled
//! - Commands without a state mapping leave the state untouched

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lifeline_core::{ActivityState, Command, Lifecycle};

#[derive(Debug, Clone, Copy, Arbitrary)]
struct Step {
    code: u8,
    settle: bool,
}

fuzz_target!(|steps: Vec<Step>| {
    let mut lifecycle = Lifecycle::new();
    let mut destroyed = false;

    for step in steps {
        let command = Command::ALL[usize::from(step.code) % Command::ALL.len()];
        let before = lifecycle.state();

        lifecycle.transition(command);
        destroyed |= command == Command::Destroy;

        let expected = if destroyed {
            ActivityState::Destroyed
        } else {
            match command {
                Command::Start => ActivityState::Started,
                Command::Resume => ActivityState::Resumed,
                Command::Pause => ActivityState::Paused,
                Command::Stop => ActivityState::Stopped,
                _ => before,
            }
        };
        assert_eq!(lifecycle.state(), expected);
        assert_eq!(lifecycle.is_destroy_requested(), destroyed);

        if command == Command::SaveState && !destroyed {
            assert!(!lifecycle.is_state_saved());
        }
        if step.settle {
            lifecycle.settle(command);
            if command == Command::SaveState {
                assert!(lifecycle.is_state_saved());
            }
        }
    }
});
