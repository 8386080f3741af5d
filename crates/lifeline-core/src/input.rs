//! Input queue handle.
//!
//! The bridge does not decode input. The platform hands over a ready-to-poll
//! queue; the bridge attaches it to the looper under
//! [`crate::LooperId::INPUT`] and forwards raw events to the application.

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::error::BridgeError;

/// One undecoded input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    /// Platform source tag (keyboard, touchscreen, ...)
    pub source: u32,
    /// Encoded event body
    pub payload: Bytes,
}

impl InputEvent {
    /// Event from `source` carrying `payload`.
    pub fn new(source: u32, payload: impl Into<Bytes>) -> Self {
        Self { source, payload: payload.into() }
    }
}

/// Pollable input queue handed over by the platform.
///
/// Cloning shares the same queue.
#[derive(Debug, Clone)]
pub struct InputQueue {
    events: Receiver<InputEvent>,
}

impl InputQueue {
    /// Wrap an existing receiver.
    pub fn from_receiver(events: Receiver<InputEvent>) -> Self {
        Self { events }
    }

    /// New queue holding up to `capacity` undelivered events, plus the feeder
    /// the platform pushes into.
    pub fn channel(capacity: usize) -> (InputFeeder, Self) {
        let (tx, rx) = bounded(capacity.max(1));
        (InputFeeder { tx }, Self { events: rx })
    }

    /// Take the next event if one is waiting.
    pub fn next_event(&self) -> Option<InputEvent> {
        self.events.try_recv().ok()
    }

    /// Events waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Whether two handles refer to the same queue.
    pub fn same_queue(&self, other: &Self) -> bool {
        self.events.same_channel(&other.events)
    }

    /// Like [`Self::next_event`], but tells an empty queue apart from one
    /// whose feeders are all gone.
    pub(crate) fn try_next(&self) -> Result<Option<InputEvent>, BridgeError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BridgeError::PipeClosed { channel: "input" }),
        }
    }

    pub(crate) fn poll_source(&self) -> Receiver<InputEvent> {
        self.events.clone()
    }
}

/// Platform side of an [`InputQueue`].
#[derive(Debug, Clone)]
pub struct InputFeeder {
    tx: Sender<InputEvent>,
}

impl InputFeeder {
    /// Push an event without blocking. Returns `false` if it was dropped.
    pub fn push(&self, event: InputEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(source = event.source, "input queue full, dropping event");
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_delivered_in_order() {
        let (feeder, queue) = InputQueue::channel(4);
        assert!(feeder.push(InputEvent::new(1, vec![1])));
        assert!(feeder.push(InputEvent::new(2, vec![2])));

        assert_eq!(queue.next_event().map(|e| e.source), Some(1));
        assert_eq!(queue.next_event().map(|e| e.source), Some(2));
        assert_eq!(queue.next_event(), None);
    }

    #[test]
    fn clones_share_the_queue() {
        let (_feeder, queue) = InputQueue::channel(1);
        let (_other_feeder, other) = InputQueue::channel(1);
        assert!(queue.same_queue(&queue.clone()));
        assert!(!queue.same_queue(&other));
    }

    #[test]
    fn full_queue_drops_events() {
        let (feeder, queue) = InputQueue::channel(1);
        assert!(feeder.push(InputEvent::new(1, Bytes::from_static(b"a"))));
        assert!(!feeder.push(InputEvent::new(1, Bytes::from_static(b"b"))));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn closed_queue_is_reported_after_drain() {
        let (feeder, queue) = InputQueue::channel(2);
        assert!(feeder.push(InputEvent::new(3, Bytes::new())));
        drop(feeder);

        assert_eq!(queue.try_next().map(|e| e.map(|e| e.source)), Ok(Some(3)));
        assert_eq!(queue.try_next(), Err(BridgeError::PipeClosed { channel: "input" }));
    }
}
