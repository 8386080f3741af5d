//! Lifeline core
//!
//! Bridges a host platform's callback-driven activity lifecycle onto a
//! dedicated application thread that sees lifecycle events as an ordered,
//! pollable stream interleaved with input and timers.
//!
//! # Architecture
//!
//! Two threads of record. The platform thread calls into [`Activity`]
//! through the [`ActivityCallbacks`] trait; every callback becomes a
//! [`Command`] on the command channel. The application thread, spawned by
//! [`Application::start`], waits on a [`Looper`] and hands each command to an
//! [`AppHandler`] between the bridge's own pre- and post-exec hooks.
//!
//! All cross-thread state sits behind one mutex and one condition variable.
//! Callbacks that must not return before the application has reacted
//! (window destruction, input queue destruction, save requests) wait for
//! their command to be post-executed, bounded by
//! [`BridgeConfig::handoff_timeout`].
//!
//! # Components
//!
//! - [`Lifecycle`]: Activity state register plus running / destroy flags
//! - [`Command`]: Closed vocabulary of lifecycle commands
//! - [`Looper`]: Multiplexed blocking wait over commands, input, timers
//! - [`channel`]: Command channel and lossy timer channel
//! - [`ScreenBuffer`]: Lock protocol around the window's pixel buffer
//! - [`Activity`]: Platform-side callback dispatcher
//! - [`Application`]: Application thread bootstrap and poll loop
//! - [`AppContext`]: Everything the application thread owns

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod activity;
mod app;
pub mod channel;
mod command;
mod config;
mod context;
mod error;
mod host;
mod input;
mod lifecycle;
mod looper;
mod screen;
mod shared;
#[cfg(test)]
mod testing;
mod window;

pub use activity::{Activity, ActivityCallbacks};
pub use app::{AppHandler, Application};
pub use channel::{CommandReader, CommandWriter, TimerChannel, TimerSender, command_channel};
pub use command::Command;
pub use config::{
    BridgeConfig, DEFAULT_COMMAND_CAPACITY, DEFAULT_HANDOFF_TIMEOUT, DEFAULT_POLL_TIMEOUT,
    DEFAULT_TIMER_CAPACITY,
};
pub use context::AppContext;
pub use error::BridgeError;
pub use host::{
    ActivityInfo, Configuration, DetachedVm, HostHandle, HostVm, Orientation, Rect, StartupParams,
};
pub use input::{InputEvent, InputFeeder, InputQueue};
pub use lifecycle::{ActivityState, Lifecycle};
pub use looper::{Looper, LooperId, LooperWaker, Poll, PollSource};
pub use screen::{ScreenBuffer, ScreenLock};
pub use window::{
    BufferDescriptor, NativeWindow, PixelBuffer, PixelFormat, SurfaceError, WindowGeometry,
    WindowHandle,
};
