//! Activity lifecycle state machine.
//!
//! Tracks where the hosted activity sits in its start/resume/pause/stop/destroy
//! cycle. The state is written only by the command pre/post hooks on the
//! application thread, while holding the shared lock.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐ Start ┌─────────┐ Resume ┌─────────┐
//! │ Created │──────>│ Started │───────>│ Resumed │
//! └─────────┘       └─────────┘        └─────────┘
//!                     ↑     │ Stop          │ Pause
//!               Start │     ↓               ↓
//!                   ┌─────────┐  Stop  ┌────────┐
//!                   │ Stopped │<───────│ Paused │
//!                   └─────────┘        └────────┘
//!                        │ Destroy (from any state)
//!                        ↓
//!                  ┌───────────┐
//!                  │ Destroyed │ terminal
//!                  └───────────┘
//! ```
//!
//! Out-of-order commands (resume before start, two resumes in a row) are not
//! rejected: the state is overwritten and the oddity logged. Only `Destroyed`
//! is sticky.

use crate::command::Command;

/// Where the activity currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityState {
    /// Created, not yet started
    Created,
    /// Started (visible soon)
    Started,
    /// In the foreground
    Resumed,
    /// Partially obscured
    Paused,
    /// No longer visible
    Stopped,
    /// Destroy requested; terminal
    Destroyed,
}

impl ActivityState {
    /// State reached by applying `command`, if the command names one.
    fn target(command: Command) -> Option<Self> {
        match command {
            Command::Start => Some(Self::Started),
            Command::Resume => Some(Self::Resumed),
            Command::Pause => Some(Self::Paused),
            Command::Stop => Some(Self::Stopped),
            Command::Destroy => Some(Self::Destroyed),
            _ => None,
        }
    }

    /// Whether `next` is the usual successor of `self`.
    fn expects(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created | Self::Stopped, Self::Started)
                | (Self::Started | Self::Paused, Self::Resumed)
                | (Self::Resumed, Self::Paused)
                | (Self::Started | Self::Paused, Self::Stopped)
                | (_, Self::Destroyed)
        )
    }
}

/// Lifecycle register plus the running / destroy-requested / state-saved
/// flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    state: ActivityState,
    running: bool,
    destroy_requested: bool,
    state_saved: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Fresh lifecycle in [`ActivityState::Created`].
    pub fn new() -> Self {
        Self {
            state: ActivityState::Created,
            running: false,
            destroy_requested: false,
            state_saved: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ActivityState {
        self.state
    }

    /// Whether the application thread has entered its loop.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a destroy command has been consumed. Never clears.
    pub fn is_destroy_requested(&self) -> bool {
        self.destroy_requested
    }

    /// Whether the last save request has been fully processed.
    ///
    /// Set once the application has handled `SaveState`, whether or not it
    /// stored a blob.
    pub fn is_state_saved(&self) -> bool {
        self.state_saved
    }

    /// Apply the pre-exec effect of `command`.
    ///
    /// Called exactly once per consumed command. After destroy nothing moves
    /// the state again.
    pub fn transition(&mut self, command: Command) {
        if self.destroy_requested {
            tracing::trace!(%command, "lifecycle frozen after destroy");
            return;
        }

        if command == Command::SaveState {
            self.state_saved = false;
            return;
        }

        let Some(next) = ActivityState::target(command) else {
            return;
        };

        if !self.state.expects(next) {
            tracing::debug!(from = ?self.state, to = ?next, %command, "out-of-order lifecycle command");
        }

        self.state = next;
        if next == ActivityState::Destroyed {
            self.destroy_requested = true;
        }
    }

    /// Apply the post-exec effect of `command`.
    pub fn settle(&mut self, command: Command) {
        if command == Command::SaveState {
            self.state_saved = true;
        }
    }

    /// Set by the application thread bootstrap around its loop.
    pub(crate) fn mark_running(&mut self, running: bool) {
        self.running = running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_created_and_idle() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ActivityState::Created);
        assert!(!lifecycle.is_running());
        assert!(!lifecycle.is_destroy_requested());
        assert!(!lifecycle.is_state_saved());
    }

    #[test]
    fn follows_the_usual_cycle() {
        let mut lifecycle = Lifecycle::new();
        let expected = [
            (Command::Start, ActivityState::Started),
            (Command::Resume, ActivityState::Resumed),
            (Command::Pause, ActivityState::Paused),
            (Command::Stop, ActivityState::Stopped),
            (Command::Start, ActivityState::Started),
        ];
        for (command, state) in expected {
            lifecycle.transition(command);
            assert_eq!(lifecycle.state(), state);
        }
    }

    #[test]
    fn non_lifecycle_commands_leave_state_alone() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(Command::Start);
        for command in [Command::WindowInit, Command::GainedFocus, Command::LowMemory] {
            lifecycle.transition(command);
            assert_eq!(lifecycle.state(), ActivityState::Started);
        }
    }

    #[test]
    fn tolerates_out_of_order_commands() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(Command::Resume);
        assert_eq!(lifecycle.state(), ActivityState::Resumed);
        lifecycle.transition(Command::Resume);
        assert_eq!(lifecycle.state(), ActivityState::Resumed);
    }

    #[test]
    fn destroy_is_terminal() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(Command::Resume);
        lifecycle.transition(Command::Destroy);
        assert!(lifecycle.is_destroy_requested());

        lifecycle.transition(Command::Resume);
        lifecycle.transition(Command::Start);
        assert_eq!(lifecycle.state(), ActivityState::Destroyed);
        assert!(lifecycle.is_destroy_requested());
    }

    #[test]
    fn save_state_flag_is_cleared_on_request_and_set_on_completion() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(Command::SaveState);
        assert!(!lifecycle.is_state_saved());
        lifecycle.settle(Command::SaveState);
        assert!(lifecycle.is_state_saved());

        lifecycle.transition(Command::SaveState);
        assert!(!lifecycle.is_state_saved());
    }
}
