//! State shared between the platform thread and the application thread.
//!
//! One mutex guards every cross-thread field and one condition variable
//! carries every wake-up: hand-off acknowledgements, the startup "running"
//! report and the final "destroyed" report. Event rates are far too low for
//! anything finer-grained to pay off.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
    command::Command,
    config::BridgeConfig,
    error::BridgeError,
    host::{Configuration, Rect},
    input::InputQueue,
    lifecycle::Lifecycle,
    window::WindowHandle,
};

/// Cross-thread fields. Only touched while holding [`Shared::lock`].
pub(crate) struct SharedState {
    pub(crate) lifecycle: Lifecycle,
    /// Bound window; valid from `WindowInit` pre-exec to `WindowTerm` post-exec
    pub(crate) window: Option<WindowHandle>,
    /// Window announced by the platform, bound by the next `WindowInit`
    pub(crate) pending_window: Option<WindowHandle>,
    /// Input queue attached to the looper
    pub(crate) input: Option<InputQueue>,
    /// Input queue announced by the platform, attached by `InputChanged`
    pub(crate) pending_input: Option<InputQueue>,
    /// Blob produced for the last save request, until the platform takes it
    pub(crate) saved_state: Option<Bytes>,
    pub(crate) configuration: Configuration,
    pub(crate) content_rect: Rect,
    pub(crate) screen_locked: bool,
    /// Commands written so far
    pub(crate) submitted: u64,
    /// Commands whose post-exec has run
    pub(crate) processed: u64,
    /// Application thread has exited
    pub(crate) destroyed: bool,
    /// Why the application thread gave up before running
    pub(crate) startup_error: Option<BridgeError>,
}

impl SharedState {
    /// Reserve the hand-off ticket for the next command written.
    pub(crate) fn submit(&mut self) -> u64 {
        self.submitted += 1;
        self.submitted
    }
}

/// The explicit bridge context, owned jointly by both threads.
pub(crate) struct Shared {
    state: Mutex<SharedState>,
    cond: Condvar,
    config: BridgeConfig,
}

impl Shared {
    pub(crate) fn new(config: BridgeConfig, configuration: Configuration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SharedState {
                lifecycle: Lifecycle::new(),
                window: None,
                pending_window: None,
                input: None,
                pending_input: None,
                saved_state: None,
                configuration,
                content_rect: Rect::default(),
                screen_locked: false,
                submitted: 0,
                processed: 0,
                destroyed: false,
                startup_error: None,
            }),
            cond: Condvar::new(),
            config,
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock()
    }

    pub(crate) fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Wake every thread waiting on the shared condition.
    pub(crate) fn notify(&self) {
        self.cond.notify_all();
    }

    /// Wait until `done` holds or `timeout` elapses. Returns the final value
    /// of `done`.
    ///
    /// A timeout with no representable deadline waits without one.
    pub(crate) fn wait_for(
        &self,
        timeout: Duration,
        mut done: impl FnMut(&SharedState) -> bool,
    ) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while !done(&state) {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return done(&state);
                    }
                },
                None => self.cond.wait(&mut state),
            }
        }
        true
    }

    /// Block the platform thread until the command holding `ticket` has been
    /// post-executed, or the application thread is gone.
    ///
    /// # Errors
    ///
    /// - `BridgeError::HandoffTimeout` after [`BridgeConfig::handoff_timeout`]
    pub(crate) fn wait_processed(&self, ticket: u64, command: Command) -> Result<(), BridgeError> {
        let timeout = self.config.handoff_timeout;
        if self.wait_for(timeout, |state| state.processed >= ticket || state.destroyed) {
            return Ok(());
        }

        tracing::error!(%command, ticket, ?timeout, "application thread did not acknowledge");
        Err(BridgeError::HandoffTimeout { command, waited: timeout })
    }

    /// Record that the application thread could not start.
    pub(crate) fn fail_startup(&self, error: BridgeError) {
        let mut state = self.state.lock();
        state.startup_error = Some(error);
        state.destroyed = true;
        drop(state);
        self.notify();
    }

    /// Record that the application thread has exited.
    pub(crate) fn finish(&self) {
        let mut state = self.state.lock();
        state.lifecycle.mark_running(false);
        state.destroyed = true;
        drop(state);
        self.notify();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::thread;

    use super::*;

    fn shared(timeout: Duration) -> Arc<Shared> {
        let config = BridgeConfig { handoff_timeout: timeout, ..BridgeConfig::default() };
        Shared::new(config, Configuration::default())
    }

    #[test]
    fn tickets_increase_monotonically() {
        let shared = shared(Duration::from_millis(10));
        let mut state = shared.lock();
        assert_eq!(state.submit(), 1);
        assert_eq!(state.submit(), 2);
    }

    #[test]
    fn handoff_returns_once_processed() {
        let shared = shared(Duration::from_secs(5));
        let ticket = shared.lock().submit();

        let acker = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            acker.lock().processed += 1;
            acker.notify();
        });

        assert_eq!(shared.wait_processed(ticket, Command::WindowTerm), Ok(()));
        handle.join().expect("acker thread");
    }

    #[test]
    fn unbounded_timeout_waits_for_the_acknowledgement() {
        let shared = shared(Duration::MAX);
        let ticket = shared.lock().submit();

        let acker = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            acker.lock().processed += 1;
            acker.notify();
        });

        assert_eq!(shared.wait_processed(ticket, Command::WindowTerm), Ok(()));
        handle.join().expect("acker thread");
    }

    #[test]
    fn handoff_times_out_without_acknowledgement() {
        let shared = shared(Duration::from_millis(20));
        let ticket = shared.lock().submit();
        assert_eq!(
            shared.wait_processed(ticket, Command::WindowTerm),
            Err(BridgeError::HandoffTimeout {
                command: Command::WindowTerm,
                waited: Duration::from_millis(20),
            })
        );
    }

    #[test]
    fn handoff_does_not_wait_for_an_exited_thread() {
        let shared = shared(Duration::from_secs(5));
        let ticket = shared.lock().submit();
        shared.finish();
        assert_eq!(shared.wait_processed(ticket, Command::SaveState), Ok(()));
        assert!(!shared.lock().lifecycle.is_running());
    }
}
