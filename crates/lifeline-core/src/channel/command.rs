//! Command channel: platform thread → application thread.
//!
//! One byte per [`Command`], delivered in write order. The writer blocks while
//! the channel is full; lifecycle events are rare enough that this never
//! matters in practice. Closing either end is how shutdown shows up on the
//! other: the reader sees "no more commands", the writer sees
//! [`BridgeError::PipeClosed`].

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

use crate::{command::Command, error::BridgeError};

const CHANNEL: &str = "command";

/// Create a command channel holding up to `capacity` unread commands.
pub fn command_channel(capacity: usize) -> (CommandWriter, CommandReader) {
    let (tx, rx) = bounded(capacity.max(1));
    (CommandWriter { tx }, CommandReader { rx })
}

/// Platform-side end of the command channel.
#[derive(Debug, Clone)]
pub struct CommandWriter {
    tx: Sender<u8>,
}

impl CommandWriter {
    /// Queue `command`, blocking while the channel is full.
    ///
    /// # Errors
    ///
    /// - `BridgeError::PipeClosed` if the reader has been dropped
    pub fn write(&self, command: Command) -> Result<(), BridgeError> {
        self.tx.send(command.code()).map_err(|_| BridgeError::PipeClosed { channel: CHANNEL })
    }
}

/// Application-side end of the command channel.
#[derive(Debug)]
pub struct CommandReader {
    rx: Receiver<u8>,
}

impl CommandReader {
    /// Block until the next command arrives.
    ///
    /// # Errors
    ///
    /// - `BridgeError::PipeClosed` once every writer is gone and the channel
    ///   is drained
    /// - `BridgeError::UnknownCommand` if the byte does not decode
    pub fn read(&self) -> Result<Command, BridgeError> {
        let code = self.rx.recv().map_err(|_| BridgeError::PipeClosed { channel: CHANNEL })?;
        Command::try_from(code)
    }

    /// Take the next command if one is queued.
    ///
    /// # Errors
    ///
    /// - `BridgeError::PipeClosed` once every writer is gone and the channel
    ///   is drained
    /// - `BridgeError::UnknownCommand` if the byte does not decode
    pub fn try_read(&self) -> Result<Option<Command>, BridgeError> {
        match self.rx.try_recv() {
            Ok(code) => Command::try_from(code).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BridgeError::PipeClosed { channel: CHANNEL }),
        }
    }

    /// Number of commands waiting to be read.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Receiver to register with the looper under [`crate::LooperId::MAIN`].
    pub(crate) fn poll_source(&self) -> Receiver<u8> {
        self.rx.clone()
    }
}
