//! Activity callback dispatcher.
//!
//! The platform invokes [`ActivityCallbacks`] on its own thread whenever the
//! activity lifecycle moves. [`Activity`] turns each call into a [`Command`]
//! on the command channel, updating the shared handles first where the
//! application needs them (pending window, pending input queue, content
//! rect, configuration).
//!
//! Three callbacks block until the application thread has post-executed
//! their command: window destruction, input queue destruction and the save
//! request. Each wait is bounded by [`crate::BridgeConfig::handoff_timeout`];
//! the rest return as soon as the command is queued.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    channel::CommandWriter,
    command::Command,
    error::BridgeError,
    host::{Configuration, Rect},
    input::InputQueue,
    lifecycle::Lifecycle,
    shared::Shared,
    window::WindowHandle,
};

/// One method per platform lifecycle event.
///
/// Called on the platform thread, one callback at a time. The only error a
/// production implementation reports is [`BridgeError::HandoffTimeout`].
pub trait ActivityCallbacks: Send + Sync {
    /// The activity is starting.
    fn on_start(&self) -> Result<(), BridgeError>;

    /// The activity moved to the foreground.
    fn on_resume(&self) -> Result<(), BridgeError>;

    /// The platform wants the application's state. Blocks until the
    /// application has produced it.
    fn on_save_instance_state(&self) -> Result<Option<Bytes>, BridgeError>;

    /// The activity is partially obscured.
    fn on_pause(&self) -> Result<(), BridgeError>;

    /// The activity is no longer visible.
    fn on_stop(&self) -> Result<(), BridgeError>;

    /// The activity is going away.
    fn on_destroy(&self) -> Result<(), BridgeError>;

    /// Input focus moved to or away from the window.
    fn on_window_focus_changed(&self, has_focus: bool) -> Result<(), BridgeError>;

    /// A window is available for drawing.
    fn on_native_window_created(&self, window: WindowHandle) -> Result<(), BridgeError>;

    /// The window changed size.
    fn on_native_window_resized(&self, window: &WindowHandle) -> Result<(), BridgeError>;

    /// The window must be redrawn.
    fn on_native_window_redraw_needed(&self, window: &WindowHandle) -> Result<(), BridgeError>;

    /// The window is about to go away. Blocks until the application has
    /// stopped using it.
    fn on_native_window_destroyed(&self, window: &WindowHandle) -> Result<(), BridgeError>;

    /// An input queue is available.
    fn on_input_queue_created(&self, queue: InputQueue) -> Result<(), BridgeError>;

    /// The input queue is about to go away. Blocks until it is detached.
    fn on_input_queue_destroyed(&self, queue: &InputQueue) -> Result<(), BridgeError>;

    /// The visible content area changed.
    fn on_content_rect_changed(&self, rect: Rect) -> Result<(), BridgeError>;

    /// The device configuration changed.
    fn on_configuration_changed(&self, configuration: Configuration) -> Result<(), BridgeError>;

    /// The system is running low on memory.
    fn on_low_memory(&self) -> Result<(), BridgeError>;
}

/// Production dispatcher, handed to the platform by
/// [`crate::Application::activity`].
#[derive(Clone)]
pub struct Activity {
    shared: Arc<Shared>,
    writer: Arc<Mutex<CommandWriter>>,
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activity").finish_non_exhaustive()
    }
}

impl Activity {
    pub(crate) fn new(shared: Arc<Shared>, writer: CommandWriter) -> Self {
        Self { shared, writer: Arc::new(Mutex::new(writer)) }
    }

    /// Snapshot of the application's lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lock().lifecycle.clone()
    }

    /// Whether the application is drawing a frame right now. Advisory.
    pub fn is_screen_locked(&self) -> bool {
        self.shared.lock().screen_locked
    }

    /// Queue `command` and return its hand-off ticket.
    ///
    /// Tickets are taken under the writer lock so they match write order. A
    /// closed channel means the application thread is gone: the ticket is
    /// returned and the command dropped.
    fn send(&self, command: Command) -> Option<u64> {
        let writer = self.writer.lock();
        let ticket = self.shared.lock().submit();

        match writer.write(command) {
            Ok(()) => {
                tracing::trace!(%command, ticket, "command queued");
                Some(ticket)
            },
            Err(err) => {
                self.shared.lock().submitted -= 1;
                tracing::debug!(%command, %err, "command dropped");
                None
            },
        }
    }

    fn send_and_wait(&self, command: Command) -> Result<(), BridgeError> {
        match self.send(command) {
            Some(ticket) => self.shared.wait_processed(ticket, command),
            None => Ok(()),
        }
    }
}

impl ActivityCallbacks for Activity {
    fn on_start(&self) -> Result<(), BridgeError> {
        tracing::debug!("start");
        self.send(Command::Start);
        Ok(())
    }

    fn on_resume(&self) -> Result<(), BridgeError> {
        tracing::debug!("resume");
        self.send(Command::Resume);
        Ok(())
    }

    fn on_save_instance_state(&self) -> Result<Option<Bytes>, BridgeError> {
        tracing::debug!("save instance state");
        self.send_and_wait(Command::SaveState)?;

        let saved = self.shared.lock().saved_state.take();
        tracing::debug!(len = saved.as_ref().map(Bytes::len), "saved state collected");
        Ok(saved)
    }

    fn on_pause(&self) -> Result<(), BridgeError> {
        tracing::debug!("pause");
        self.send(Command::Pause);
        Ok(())
    }

    fn on_stop(&self) -> Result<(), BridgeError> {
        tracing::debug!("stop");
        self.send(Command::Stop);
        Ok(())
    }

    fn on_destroy(&self) -> Result<(), BridgeError> {
        tracing::debug!("destroy");
        self.send(Command::Destroy);
        Ok(())
    }

    fn on_window_focus_changed(&self, has_focus: bool) -> Result<(), BridgeError> {
        tracing::debug!(has_focus, "window focus changed");
        self.send(if has_focus { Command::GainedFocus } else { Command::LostFocus });
        Ok(())
    }

    fn on_native_window_created(&self, window: WindowHandle) -> Result<(), BridgeError> {
        tracing::debug!(?window, "native window created");
        let replacing = {
            let mut state = self.shared.lock();
            state.pending_window = Some(window);
            state.window.is_some()
        };

        if replacing {
            tracing::debug!("replacing bound window");
            self.send(Command::WindowTerm);
        }
        self.send(Command::WindowInit);
        Ok(())
    }

    /// Queues `WindowResized` without touching the screen. A frame locked at
    /// the old size is posted as is; the screen is reallocated when the
    /// command is consumed.
    fn on_native_window_resized(&self, window: &WindowHandle) -> Result<(), BridgeError> {
        tracing::debug!(geometry = ?window.geometry(), "native window resized");
        self.send(Command::WindowResized);
        Ok(())
    }

    fn on_native_window_redraw_needed(&self, _window: &WindowHandle) -> Result<(), BridgeError> {
        tracing::trace!("redraw needed");
        self.send(Command::RedrawNeeded);
        Ok(())
    }

    fn on_native_window_destroyed(&self, window: &WindowHandle) -> Result<(), BridgeError> {
        tracing::debug!(?window, "native window destroyed");
        self.send_and_wait(Command::WindowTerm)
    }

    fn on_input_queue_created(&self, queue: InputQueue) -> Result<(), BridgeError> {
        tracing::debug!("input queue created");
        self.shared.lock().pending_input = Some(queue);
        self.send(Command::InputChanged);
        Ok(())
    }

    fn on_input_queue_destroyed(&self, _queue: &InputQueue) -> Result<(), BridgeError> {
        tracing::debug!("input queue destroyed");
        self.shared.lock().pending_input = None;
        self.send_and_wait(Command::InputChanged)
    }

    fn on_content_rect_changed(&self, rect: Rect) -> Result<(), BridgeError> {
        tracing::debug!(?rect, "content rect changed");
        self.shared.lock().content_rect = rect;
        self.send(Command::ContentRectChanged);
        Ok(())
    }

    fn on_configuration_changed(&self, configuration: Configuration) -> Result<(), BridgeError> {
        configuration.log();
        self.shared.lock().configuration = configuration;
        self.send(Command::ConfigChanged);
        Ok(())
    }

    fn on_low_memory(&self) -> Result<(), BridgeError> {
        tracing::debug!("low memory");
        self.send(Command::LowMemory);
        Ok(())
    }
}
