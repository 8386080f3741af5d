//! Simulation errors.

use std::time::Duration;

use lifeline_core::BridgeError;
use thiserror::Error;

/// Why a simulated run failed.
#[derive(Debug, Error)]
pub enum SimError {
    /// The bridge refused to start or the application thread died.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A platform callback returned an error.
    #[error("callback for script event {index} failed: {source}")]
    Callback {
        /// Index of the event in the script
        index: usize,
        /// What the bridge reported
        source: BridgeError,
    },

    /// A scripted input event did not fit into its queue.
    #[error("input event {index} was rejected by its queue")]
    InputRejected {
        /// Position of the event in the queue
        index: usize,
    },

    /// The application stopped reading the input queue.
    #[error("application read {read} of {expected} input events")]
    InputsNotRead {
        /// Events the script queued
        expected: usize,
        /// Events the application read in time
        read: usize,
    },

    /// The application thread was still alive after `Destroy`.
    #[error("application thread still running {waited:?} after destroy")]
    NotDestroyed {
        /// How long the simulator waited
        waited: Duration,
    },

    /// The restarted instance did not see the state saved by the first one.
    #[error("saved state was not restored: expected {expected:?}, got {actual:?}")]
    StateNotRestored {
        /// Blob returned by the first instance
        expected: Option<Vec<u8>>,
        /// Blob the second instance started with
        actual: Option<Vec<u8>>,
    },
}
