//! Trace snapshots for invariant checking.

use crate::handler::{Observation, Trace};

/// Frozen copy of a trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSnapshot {
    /// Observations, oldest first.
    pub observations: Vec<Observation>,
}

impl TraceSnapshot {
    /// Snapshot everything `trace` has recorded so far.
    pub fn from_trace(trace: &Trace) -> Self {
        Self { observations: trace.observations() }
    }

    /// Snapshot of explicit observations.
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Observations with their trace positions.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Observation)> {
        self.observations.iter().enumerate()
    }
}
