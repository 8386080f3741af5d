//! Application thread context.
//!
//! [`AppContext`] is everything the application thread owns: the command
//! reader, the looper, the timer channel and the screen buffer, plus a handle
//! on the shared state for lifecycle queries. It is handed to every
//! [`crate::AppHandler`] method.
//!
//! The command pre/post hooks live here. They are the only place the shared
//! window, input queue and lifecycle fields change on the application side,
//! and `post_exec` is what acknowledges a hand-off to the platform thread.

use std::{fmt, sync::Arc};

use bytes::Bytes;

use crate::{
    channel::{CommandReader, TimerChannel, TimerSender},
    command::Command,
    config::BridgeConfig,
    error::BridgeError,
    host::{ActivityInfo, Configuration, HostVm, Rect, StartupParams},
    input::{InputEvent, InputQueue},
    lifecycle::{ActivityState, Lifecycle},
    looper::{Looper, LooperId, LooperWaker},
    screen::ScreenBuffer,
    shared::Shared,
    window::WindowHandle,
};

/// State owned by the application thread.
pub struct AppContext {
    shared: Arc<Shared>,
    commands: CommandReader,
    looper: Looper,
    timers: TimerChannel,
    screen: ScreenBuffer,
    vm: Arc<dyn HostVm>,
    activity: ActivityInfo,
    startup_saved_state: Option<Bytes>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("looper", &self.looper)
            .field("timers", &self.timers)
            .field("screen", &self.screen)
            .field("activity", &self.activity)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub(crate) fn new(
        shared: Arc<Shared>,
        commands: CommandReader,
        vm: Arc<dyn HostVm>,
        params: StartupParams,
    ) -> Result<Self, BridgeError> {
        let mut looper = Looper::new();
        looper.attach(LooperId::MAIN, commands.poll_source())?;

        let timers = TimerChannel::new(shared.config().timer_capacity);
        let screen = ScreenBuffer::new(Arc::clone(&shared));

        Ok(Self {
            shared,
            commands,
            looper,
            timers,
            screen,
            vm,
            activity: params.activity,
            startup_saved_state: params.saved_state,
        })
    }

    /// Current lifecycle state.
    pub fn activity_state(&self) -> ActivityState {
        self.shared.lock().lifecycle.state()
    }

    /// Snapshot of the lifecycle register and flags.
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lock().lifecycle.clone()
    }

    /// Whether `Destroy` has been dequeued.
    pub fn is_destroy_requested(&self) -> bool {
        self.shared.lock().lifecycle.is_destroy_requested()
    }

    /// Whether the application thread is inside its loop.
    pub fn is_running(&self) -> bool {
        self.shared.lock().lifecycle.is_running()
    }

    /// The bound window, if any.
    pub fn window(&self) -> Option<WindowHandle> {
        self.shared.lock().window.clone()
    }

    /// The attached input queue, if any.
    pub fn input_queue(&self) -> Option<InputQueue> {
        self.shared.lock().input.clone()
    }

    /// Visible content area last reported by the platform.
    pub fn content_rect(&self) -> Rect {
        self.shared.lock().content_rect
    }

    /// Configuration last reported by the platform.
    pub fn configuration(&self) -> Configuration {
        self.shared.lock().configuration.clone()
    }

    /// State saved by a previous instance, as handed over at creation.
    pub fn startup_saved_state(&self) -> Option<&Bytes> {
        self.startup_saved_state.as_ref()
    }

    /// Provide the blob for the save request being handled.
    ///
    /// Call from `on_command(SaveState)`. An unclaimed earlier blob is
    /// released first.
    pub fn set_saved_state(&mut self, state: impl Into<Bytes>) {
        let state = state.into();
        let len = state.len();
        let previous = self.shared.lock().saved_state.replace(state);
        if let Some(previous) = previous {
            tracing::debug!(len = previous.len(), "releasing unclaimed saved state");
        }
        tracing::debug!(len, "saved state stored");
    }

    /// Configuration the bridge was started with.
    pub fn bridge_config(&self) -> &BridgeConfig {
        self.shared.config()
    }

    /// Screen buffer guard.
    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    /// Screen buffer guard, for locking.
    pub fn screen_mut(&mut self) -> &mut ScreenBuffer {
        &mut self.screen
    }

    /// The looper driving this thread.
    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    /// The looper, for registering application sources.
    pub fn looper_mut(&mut self) -> &mut Looper {
        &mut self.looper
    }

    /// Handle that wakes this thread's looper from elsewhere.
    pub fn waker(&self) -> LooperWaker {
        self.looper.waker()
    }

    /// Static facts about the hosting activity.
    pub fn activity_info(&self) -> &ActivityInfo {
        &self.activity
    }

    /// The VM binding this thread is attached to.
    pub fn vm(&self) -> &dyn HostVm {
        self.vm.as_ref()
    }

    /// Allocate the timer channel and register it under [`LooperId::TIMER`].
    ///
    /// # Errors
    ///
    /// - `BridgeError::ResourceLeak` (debug builds) if it already exists
    pub fn create_timer_source(&mut self) -> Result<(), BridgeError> {
        self.timers.create_timer_source(&mut self.looper)
    }

    /// Deregister and close the timer channel. No-op when absent.
    pub fn destroy_timer_source(&mut self) {
        self.timers.destroy_timer_source(&mut self.looper);
    }

    /// Sender for timer-expiry contexts, if the channel exists.
    pub fn timer_sender(&self) -> Option<TimerSender> {
        self.timers.sender()
    }

    /// Read one fired timer slot.
    pub fn receive_timer_index(&self) -> Option<u8> {
        self.timers.receive_timer_index()
    }

    /// Take the next command without blocking.
    ///
    /// # Errors
    ///
    /// - `BridgeError::PipeClosed` once the platform side is gone
    /// - `BridgeError::UnknownCommand` for a byte that does not decode
    pub fn read_command(&self) -> Result<Option<Command>, BridgeError> {
        self.commands.try_read()
    }

    /// Apply the bridge's side of `command` before the application sees it.
    pub fn pre_exec(&mut self, command: Command) {
        let mut state = self.shared.lock();
        state.lifecycle.transition(command);

        let mut geometry = None;
        match command {
            Command::InputChanged => {
                self.looper.remove_source(LooperId::INPUT);
                state.input = state.pending_input.clone();
                if let Some(queue) = &state.input
                    && let Err(err) = self.looper.attach(LooperId::INPUT, queue.poll_source())
                {
                    tracing::warn!(%err, "input queue not attached");
                }
                tracing::debug!(attached = state.input.is_some(), "input queue changed");
            },
            Command::WindowInit => {
                if let Some(window) = state.pending_window.take() {
                    state.window = Some(window);
                }
                geometry = state.window.as_ref().map(|w| w.geometry());
                tracing::debug!(bound = geometry.is_some(), "window init");
            },
            Command::WindowResized => {
                geometry = state.window.as_ref().map(|w| w.geometry());
            },
            Command::SaveState => {
                if let Some(previous) = state.saved_state.take() {
                    tracing::debug!(len = previous.len(), "releasing unclaimed saved state");
                }
            },
            _ => {},
        }
        drop(state);

        if let Some(geometry) = geometry {
            self.screen.allocate(geometry);
        }
        self.shared.notify();
    }

    /// Apply the bridge's side of `command` after the application handled it
    /// and acknowledge it to the platform thread.
    pub fn post_exec(&mut self, command: Command) {
        let mut state = self.shared.lock();
        state.lifecycle.settle(command);

        if command == Command::WindowTerm {
            if state.screen_locked {
                tracing::warn!("window terminated while the screen is locked");
            }
            state.window = None;
            tracing::debug!("window unbound");
        }

        state.processed += 1;
        drop(state);
        self.shared.notify();
    }

    /// Next event from the attached input queue. A queue whose platform side
    /// is gone is detached.
    pub(crate) fn next_input_event(&mut self) -> Option<InputEvent> {
        let queue = self.shared.lock().input.clone()?;
        match queue.try_next() {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(%err, "detaching closed input queue");
                self.looper.remove_source(LooperId::INPUT);
                let mut state = self.shared.lock();
                if state.input.as_ref().is_some_and(|q| q.same_queue(&queue)) {
                    state.input = None;
                }
                None
            },
        }
    }

    /// Consume every queued command with its pre/post hooks only.
    ///
    /// Used once destroy was requested: platform waiters are released but the
    /// application sees nothing.
    pub(crate) fn drain_commands(&mut self) {
        loop {
            match self.read_command() {
                Ok(Some(command)) => {
                    tracing::trace!(%command, "draining command after destroy");
                    self.pre_exec(command);
                    self.post_exec(command);
                },
                Ok(None) | Err(BridgeError::PipeClosed { .. }) => break,
                Err(err) => tracing::warn!(%err, "skipping undecodable command"),
            }
        }
    }

    /// Release everything the application thread holds.
    pub(crate) fn teardown(&mut self) {
        self.destroy_timer_source();
        self.looper.remove_source(LooperId::INPUT);

        let mut state = self.shared.lock();
        state.input = None;
        state.pending_input = None;
        state.window = None;
        state.pending_window = None;
        if let Some(blob) = state.saved_state.take() {
            tracing::debug!(len = blob.len(), "releasing saved state on exit");
        }
        drop(state);

        tracing::debug!("application context torn down");
    }
}
