//! Lifecycle command vocabulary.
//!
//! A [`Command`] is one byte on the command channel. The set is closed; codes
//! are stable and start at zero in declaration order.

use std::fmt;

use crate::error::BridgeError;

/// Lifecycle events forwarded from the platform thread to the application
/// thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Command {
    /// The input queue was attached, replaced or removed.
    InputChanged = 0,
    /// A new window is ready; `AppContext::window` is valid from here.
    WindowInit = 1,
    /// The window is going away; release it before returning.
    WindowTerm = 2,
    /// The window changed size.
    WindowResized = 3,
    /// The window must be redrawn.
    RedrawNeeded = 4,
    /// The visible content area changed.
    ContentRectChanged = 5,
    /// The activity gained input focus.
    GainedFocus = 6,
    /// The activity lost input focus.
    LostFocus = 7,
    /// The device configuration changed.
    ConfigChanged = 8,
    /// The system is running low on memory.
    LowMemory = 9,
    /// The activity was started.
    Start = 10,
    /// The activity was resumed.
    Resume = 11,
    /// The application should produce its saved state.
    SaveState = 12,
    /// The activity was paused.
    Pause = 13,
    /// The activity was stopped.
    Stop = 14,
    /// The activity is being destroyed. Terminal.
    Destroy = 15,
}

impl Command {
    /// Every command, in code order.
    pub const ALL: [Command; 16] = [
        Command::InputChanged,
        Command::WindowInit,
        Command::WindowTerm,
        Command::WindowResized,
        Command::RedrawNeeded,
        Command::ContentRectChanged,
        Command::GainedFocus,
        Command::LostFocus,
        Command::ConfigChanged,
        Command::LowMemory,
        Command::Start,
        Command::Resume,
        Command::SaveState,
        Command::Pause,
        Command::Stop,
        Command::Destroy,
    ];

    /// Wire code.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the platform callback that sent this command must wait for the
    /// application thread to finish processing it.
    ///
    /// `InputChanged` only waits when the queue is being destroyed; the
    /// dispatcher decides that case itself.
    #[must_use]
    pub fn requires_handoff(self) -> bool {
        matches!(self, Self::WindowTerm | Self::SaveState)
    }

    /// Kebab-case name, used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::InputChanged => "input-changed",
            Self::WindowInit => "window-init",
            Self::WindowTerm => "window-term",
            Self::WindowResized => "window-resized",
            Self::RedrawNeeded => "redraw-needed",
            Self::ContentRectChanged => "content-rect-changed",
            Self::GainedFocus => "gained-focus",
            Self::LostFocus => "lost-focus",
            Self::ConfigChanged => "config-changed",
            Self::LowMemory => "low-memory",
            Self::Start => "start",
            Self::Resume => "resume",
            Self::SaveState => "save-state",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Command {
    type Error = BridgeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(usize::from(code)).copied().ok_or(BridgeError::UnknownCommand(code))
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command.code()
    }
}
