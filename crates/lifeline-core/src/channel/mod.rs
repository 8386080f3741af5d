//! Byte channels between the platform side and the application thread.
//!
//! - [`command`]: lifecycle commands, blocking writer, FIFO
//! - [`timer`]: fired timer slots, lossy non-blocking sender, FIFO

pub mod command;
pub mod timer;

pub use command::{CommandReader, CommandWriter, command_channel};
pub use timer::{TimerChannel, TimerSender};
