//! Deterministic test doubles for lifeline.
//!
//! Fake implementations of the platform-facing traits plus a recording
//! application handler, so the bridge can be driven end to end from a test
//! thread standing in for the platform.
//!
//! # Components
//!
//! - [`FakeWindow`]: Scriptable native window that records posted frames
//! - [`FakeVm`]: VM binding counting attach/detach
//! - [`RecordingHandler`]: Application handler appending to a [`Trace`]
//! - [`ScriptedHost`]: Platform thread playing a list of [`HostEvent`]s
//! - [`RecordingCallbacks`]: Callback table that only records calls
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties every trace must satisfy. Use
//! [`InvariantRegistry::standard()`] for the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod handler;
pub mod host;
pub mod invariants;
pub mod vm;
pub mod window;

pub use handler::{Observation, RecordingHandler, Trace};
pub use host::{HostEvent, HostReport, RecordingCallbacks, ScriptedHost};
pub use invariants::{
    DestroyIsTerminal, Invariant, InvariantKind, InvariantRegistry, InvariantResult,
    NoDispatchAfterDestroy, NoDrawWithoutWindow, ScreenUnlockedBetweenCommands, TraceSnapshot,
    Violation,
};
pub use vm::FakeVm;
pub use window::{FakeWindow, PostedFrame};
