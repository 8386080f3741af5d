//! Timer channel: fired timer slots → application thread.
//!
//! Timer expiry may run on an OS timer-callback thread, which must never
//! block. [`TimerSender::send_timer_index`] therefore drops the index when
//! the channel is full instead of waiting. Indices are delivered in send
//! order and never deduplicated.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{
    error::{BridgeError, resource_leak},
    looper::{Looper, LooperId},
};

/// Sending half handed to timer-expiry contexts.
#[derive(Debug, Clone)]
pub struct TimerSender {
    tx: Sender<u8>,
}

impl TimerSender {
    /// Post a fired timer slot without blocking.
    ///
    /// Returns `false` when the index was dropped (channel full or torn
    /// down). Drops are logged, never propagated.
    pub fn send_timer_index(&self, slot: u8) -> bool {
        match self.tx.try_send(slot) {
            Ok(()) => true,
            Err(TrySendError::Full(slot)) => {
                tracing::warn!(slot, "timer channel full, dropping index");
                false
            },
            Err(TrySendError::Disconnected(slot)) => {
                tracing::debug!(slot, "timer channel destroyed, dropping index");
                false
            },
        }
    }
}

struct Ends {
    tx: Sender<u8>,
    rx: Receiver<u8>,
}

/// Timer channel owned by the application thread.
///
/// Created and destroyed on demand; while it exists its receiver is
/// registered with the looper under [`LooperId::TIMER`].
pub struct TimerChannel {
    capacity: usize,
    ends: Option<Ends>,
}

impl std::fmt::Debug for TimerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerChannel")
            .field("capacity", &self.capacity)
            .field("active", &self.is_active())
            .finish()
    }
}

impl TimerChannel {
    /// Inactive channel that will hold up to `capacity` pending indices once
    /// created.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), ends: None }
    }

    /// Whether the channel currently exists.
    pub fn is_active(&self) -> bool {
        self.ends.is_some()
    }

    /// Allocate the channel and register it with `looper`.
    ///
    /// # Errors
    ///
    /// - `BridgeError::ResourceLeak` (debug builds) if it already exists
    /// - `BridgeError::DuplicateIdent` if something else holds
    ///   [`LooperId::TIMER`]
    pub fn create_timer_source(&mut self, looper: &mut Looper) -> Result<(), BridgeError> {
        if self.is_active() {
            return resource_leak("timer channel created twice");
        }

        let (tx, rx) = bounded(self.capacity);
        looper.attach(LooperId::TIMER, rx.clone())?;
        self.ends = Some(Ends { tx, rx });
        tracing::debug!(capacity = self.capacity, "timer channel created");
        Ok(())
    }

    /// Deregister and close both ends. No-op when already destroyed.
    pub fn destroy_timer_source(&mut self, looper: &mut Looper) {
        if self.ends.take().is_some() {
            looper.remove_source(LooperId::TIMER);
            tracing::debug!("timer channel destroyed");
        }
    }

    /// A sender for timer-expiry contexts, if the channel exists.
    ///
    /// Senders outlive a destroy; their sends are then dropped.
    pub fn sender(&self) -> Option<TimerSender> {
        self.ends.as_ref().map(|ends| TimerSender { tx: ends.tx.clone() })
    }

    /// Read exactly one fired slot, if one is pending.
    pub fn receive_timer_index(&self) -> Option<u8> {
        self.ends.as_ref().and_then(|ends| ends.rx.try_recv().ok())
    }

    /// Indices waiting to be received.
    pub fn pending(&self) -> usize {
        self.ends.as_ref().map_or(0, |ends| ends.rx.len())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn delivers_slots_in_send_order() {
        let mut looper = Looper::new();
        let mut timers = TimerChannel::new(8);
        timers.create_timer_source(&mut looper).expect("create");
        assert!(looper.contains(LooperId::TIMER));

        let sender = timers.sender().expect("sender");
        for slot in [3, 1, 3, 9] {
            assert!(sender.send_timer_index(slot));
        }

        let drained: Vec<_> = std::iter::from_fn(|| timers.receive_timer_index()).collect();
        assert_eq!(drained, vec![3, 1, 3, 9]);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let mut looper = Looper::new();
        let mut timers = TimerChannel::new(2);
        timers.create_timer_source(&mut looper).expect("create");
        let sender = timers.sender().expect("sender");

        assert!(sender.send_timer_index(1));
        assert!(sender.send_timer_index(2));
        assert!(!sender.send_timer_index(3));
        assert_eq!(timers.pending(), 2);
    }

    #[test]
    fn destroy_is_idempotent_and_detaches() {
        let mut looper = Looper::new();
        let mut timers = TimerChannel::new(4);
        timers.create_timer_source(&mut looper).expect("create");
        let sender = timers.sender().expect("sender");

        timers.destroy_timer_source(&mut looper);
        timers.destroy_timer_source(&mut looper);
        assert!(!timers.is_active());
        assert!(!looper.contains(LooperId::TIMER));
        assert!(!sender.send_timer_index(5));
        assert_eq!(timers.receive_timer_index(), None);
    }

    #[test]
    fn can_be_recreated_after_destroy() {
        let mut looper = Looper::new();
        let mut timers = TimerChannel::new(4);
        timers.create_timer_source(&mut looper).expect("create");
        timers.destroy_timer_source(&mut looper);
        timers.create_timer_source(&mut looper).expect("recreate");
        assert!(timers.is_active());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn double_create_is_a_leak() {
        let mut looper = Looper::new();
        let mut timers = TimerChannel::new(4);
        timers.create_timer_source(&mut looper).expect("create");
        assert_eq!(
            timers.create_timer_source(&mut looper),
            Err(BridgeError::ResourceLeak { what: "timer channel created twice" })
        );
        assert!(timers.is_active());
    }
}
