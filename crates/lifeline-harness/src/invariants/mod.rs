//! Invariant checking over application traces.
//!
//! Invariants are properties every run of the bridge must satisfy, whatever
//! the platform did and in whatever order. They are checked against a
//! [`TraceSnapshot`] taken from a [`crate::Trace`] once a scenario has
//! finished, so the check sees one consistent history.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = TraceSnapshot::from_trace(&trace);
//! registry.assert_all(&snapshot, "after scenario");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    DestroyIsTerminal, NoDispatchAfterDestroy, NoDrawWithoutWindow, ScreenUnlockedBetweenCommands,
};
pub use snapshot::TraceSnapshot;

/// Which invariant was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// Lifecycle state never leaves `Destroyed`
    DestroyIsTerminal,
    /// No command reaches the application after `Destroy`
    NoDispatchAfterDestroy,
    /// No frame is posted while no window is bound
    NoDrawWithoutWindow,
    /// No command is dispatched while a frame is being drawn
    ScreenUnlockedBetweenCommands,
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DestroyIsTerminal => "destroy-is-terminal",
            Self::NoDispatchAfterDestroy => "no-dispatch-after-destroy",
            Self::NoDrawWithoutWindow => "no-draw-without-window",
            Self::ScreenUnlockedBetweenCommands => "screen-unlocked-between-commands",
        };
        f.write_str(name)
    }
}

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Which invariant.
    pub invariant: InvariantKind,
    /// Position in the trace where it broke.
    pub index: usize,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at #{}: {}", self.invariant, self.index, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a trace.
pub trait Invariant: Send + Sync {
    /// Which invariant this is.
    fn kind(&self) -> InvariantKind;

    /// Check the invariant against `trace`.
    fn check(&self, trace: &TraceSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.invariants.iter().map(|i| i.kind())).finish()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every standard invariant:
    /// - [`DestroyIsTerminal`]
    /// - [`NoDispatchAfterDestroy`]
    /// - [`NoDrawWithoutWindow`]
    /// - [`ScreenUnlockedBetweenCommands`]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(DestroyIsTerminal);
        registry.add(NoDispatchAfterDestroy);
        registry.add(NoDrawWithoutWindow);
        registry.add(ScreenUnlockedBetweenCommands);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants. Returns every violation found.
    pub fn check_all(&self, trace: &TraceSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(trace).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, trace: &TraceSnapshot, context: &str) {
        if let Err(violations) = self.check_all(trace) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_every_check() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn empty_trace_passes() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&TraceSnapshot::default()).is_ok());
    }

    #[test]
    fn violations_render_with_position() {
        let violation = Violation {
            invariant: InvariantKind::NoDispatchAfterDestroy,
            index: 4,
            message: "start dispatched".to_string(),
        };
        assert_eq!(violation.to_string(), "no-dispatch-after-destroy at #4: start dispatched");
    }
}
