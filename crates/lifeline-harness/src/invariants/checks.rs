//! Standard invariant checks.

use lifeline_core::{ActivityState, Command};

use super::{Invariant, InvariantKind, InvariantResult, TraceSnapshot, Violation};
use crate::handler::Observation;

/// Once the lifecycle reaches `Destroyed` it stays there.
///
/// Every command or exit observed after the first `Destroyed` state must
/// still report `Destroyed`.
pub struct DestroyIsTerminal;

impl Invariant for DestroyIsTerminal {
    fn kind(&self) -> InvariantKind {
        InvariantKind::DestroyIsTerminal
    }

    fn check(&self, trace: &TraceSnapshot) -> InvariantResult {
        let mut destroyed = false;
        for (index, observation) in trace.iter() {
            let state = match observation {
                Observation::Command { state, .. } | Observation::Exit { state } => *state,
                _ => continue,
            };
            if destroyed && state != ActivityState::Destroyed {
                return Err(Violation {
                    invariant: self.kind(),
                    index,
                    message: format!("state moved to {state:?} after destroy"),
                });
            }
            destroyed |= state == ActivityState::Destroyed;
        }
        Ok(())
    }
}

/// No command reaches the application after `Destroy`.
pub struct NoDispatchAfterDestroy;

impl Invariant for NoDispatchAfterDestroy {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoDispatchAfterDestroy
    }

    fn check(&self, trace: &TraceSnapshot) -> InvariantResult {
        let mut destroy_seen = false;
        for (index, observation) in trace.iter() {
            let Observation::Command { command, .. } = observation else {
                continue;
            };
            if destroy_seen {
                return Err(Violation {
                    invariant: self.kind(),
                    index,
                    message: format!("{command} dispatched after destroy"),
                });
            }
            destroy_seen = *command == Command::Destroy;
        }
        Ok(())
    }
}

/// Frames are only posted while a window is bound.
///
/// A window counts as bound from a `WindowInit` dispatch that saw one until
/// the `WindowTerm` dispatch; the application must not draw in between
/// `WindowTerm` and the next `WindowInit`.
pub struct NoDrawWithoutWindow;

impl Invariant for NoDrawWithoutWindow {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoDrawWithoutWindow
    }

    fn check(&self, trace: &TraceSnapshot) -> InvariantResult {
        let mut bound = false;
        for (index, observation) in trace.iter() {
            match observation {
                Observation::Command { command: Command::WindowTerm, .. } => bound = false,
                Observation::Command { window_bound, .. } => bound = *window_bound,
                Observation::Frame { width, height } if !bound => {
                    return Err(Violation {
                        invariant: self.kind(),
                        index,
                        message: format!("{width}x{height} frame posted without a window"),
                    });
                },
                _ => {},
            }
        }
        Ok(())
    }
}

/// No command is dispatched while a frame is half drawn.
pub struct ScreenUnlockedBetweenCommands;

impl Invariant for ScreenUnlockedBetweenCommands {
    fn kind(&self) -> InvariantKind {
        InvariantKind::ScreenUnlockedBetweenCommands
    }

    fn check(&self, trace: &TraceSnapshot) -> InvariantResult {
        for (index, observation) in trace.iter() {
            if let Observation::Command { command, screen_locked: true, .. } = observation {
                return Err(Violation {
                    invariant: self.kind(),
                    index,
                    message: format!("{command} dispatched with the screen locked"),
                });
            }
        }
        Ok(())
    }
}
