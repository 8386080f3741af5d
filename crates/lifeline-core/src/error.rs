//! Error types for the lifecycle bridge.
//!
//! Errors split into three groups: expected conditions the caller recovers
//! from (no surface to draw on, channel closed during shutdown), programming
//! defects (unbalanced lock/unlock, double timer-source creation) and fatal
//! liveness failures (the application thread stopped acknowledging
//! hand-offs).
//!
//! Lifecycle ordering violations are deliberately absent: the state machine
//! accepts out-of-order commands.

use std::time::Duration;

use thiserror::Error;

use crate::{command::Command, looper::LooperId};

/// Errors produced by the bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No window is bound, or the platform refused to lock it. Skip the frame.
    #[error("surface unavailable: {reason}")]
    SurfaceUnavailable {
        /// Why the surface could not be locked
        reason: String,
    },

    /// The other end of a channel is gone.
    #[error("{channel} channel closed")]
    PipeClosed {
        /// Which channel closed
        channel: &'static str,
    },

    /// Unbalanced acquire/release of a bridge resource.
    #[error("resource leak: {what}")]
    ResourceLeak {
        /// The leaked resource
        what: &'static str,
    },

    /// The platform thread waited too long for the application thread.
    #[error("hand-off timeout: {command} not acknowledged after {waited:?}")]
    HandoffTimeout {
        /// Command whose processing was awaited
        command: Command,
        /// How long the platform thread waited
        waited: Duration,
    },

    /// The application thread did not report running in time.
    #[error("application thread not running after {waited:?}")]
    StartupTimeout {
        /// How long the caller waited
        waited: Duration,
    },

    /// The application thread panicked.
    #[error("application thread panicked")]
    ThreadPanicked,

    /// A byte on the command channel did not decode to a command.
    #[error("unknown command code {0}")]
    UnknownCommand(u8),

    /// A user source tried to register under a reserved looper identifier.
    #[error("looper identifier {0} is reserved")]
    ReservedIdent(LooperId),

    /// A looper identifier is already registered.
    #[error("looper identifier {0} is already registered")]
    DuplicateIdent(LooperId),

    /// The application thread could not be spawned.
    #[error("failed to spawn application thread: {0}")]
    Spawn(String),

    /// The host VM binding failed.
    #[error("host VM error: {0}")]
    Vm(String),
}

impl BridgeError {
    /// Returns true if the caller is expected to carry on after this error.
    ///
    /// A missing surface means "skip this frame"; a closed channel is the
    /// normal end of the session. Everything else is a defect or a liveness
    /// failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceUnavailable { .. } | Self::PipeClosed { .. })
    }

    pub(crate) fn surface(reason: impl Into<String>) -> Self {
        Self::SurfaceUnavailable { reason: reason.into() }
    }
}

/// Report an unbalanced resource.
///
/// Always logged. Debug builds surface it as [`BridgeError::ResourceLeak`] so
/// tests catch it; release builds log and carry on.
pub(crate) fn resource_leak(what: &'static str) -> Result<(), BridgeError> {
    tracing::error!(what, "resource leak");
    if cfg!(debug_assertions) { Err(BridgeError::ResourceLeak { what }) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_frame_and_shutdown_are_recoverable() {
        assert!(BridgeError::surface("no window").is_recoverable());
        assert!(BridgeError::PipeClosed { channel: "command" }.is_recoverable());
    }

    #[test]
    fn defects_are_not_recoverable() {
        assert!(!BridgeError::ResourceLeak { what: "screen lock" }.is_recoverable());
        assert!(
            !BridgeError::HandoffTimeout {
                command: Command::WindowTerm,
                waited: Duration::from_millis(10),
            }
            .is_recoverable()
        );
        assert!(!BridgeError::UnknownCommand(0xff).is_recoverable());
        assert!(!BridgeError::ReservedIdent(LooperId::MAIN).is_recoverable());
        assert!(!BridgeError::Spawn("io".to_string()).is_recoverable());
    }

    #[test]
    fn timeout_message_names_the_command() {
        let err = BridgeError::HandoffTimeout {
            command: Command::WindowTerm,
            waited: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "hand-off timeout: window-term not acknowledged after 250ms");
    }

    #[test]
    #[cfg(debug_assertions)]
    fn leaks_fail_in_debug_builds() {
        assert_eq!(
            resource_leak("screen lock"),
            Err(BridgeError::ResourceLeak { what: "screen lock" })
        );
    }
}
