//! Multiplexed blocking wait for the application thread.
//!
//! The [`Looper`] waits on every registered source at once and reports which
//! one became ready. The command channel, input queue and timer channel
//! register under reserved identifiers; applications add their own sources
//! (timeouts, socket watchers) from [`LooperId::USER`] upwards.
//!
//! Readiness may be reported spuriously. Consumers read with non-blocking
//! calls after [`Poll::Ready`] and treat an empty source as "nothing to do".

use std::{fmt, time::Duration};

use crossbeam_channel::{Receiver, Select, Sender, TrySendError, bounded};

use crate::error::BridgeError;

/// Identifier a source is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LooperId(pub i32);

impl LooperId {
    /// Lifecycle commands.
    pub const MAIN: Self = Self(1);
    /// Input events of the attached input queue.
    pub const INPUT: Self = Self(2);
    /// Fired timer slots.
    pub const TIMER: Self = Self(3);
    /// First identifier available to applications.
    pub const USER: Self = Self(4);
    /// Cross-thread wake-ups, never handed to applications.
    pub(crate) const WAKE: Self = Self(-1);

    /// The `offset`-th user identifier.
    #[must_use]
    pub fn user(offset: u16) -> Self {
        Self(Self::USER.0 + i32::from(offset))
    }

    /// Whether the identifier belongs to the bridge.
    #[must_use]
    pub fn is_reserved(self) -> bool {
        self.0 < Self::USER.0
    }
}

impl fmt::Display for LooperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MAIN => f.write_str("main"),
            Self::INPUT => f.write_str("input"),
            Self::TIMER => f.write_str("timer"),
            Self::WAKE => f.write_str("wake"),
            Self(id) => write!(f, "user:{id}"),
        }
    }
}

/// Something the looper can wait on.
///
/// Implemented for every [`crossbeam_channel::Receiver`], which covers the
/// bridge's own channels and most application sources.
pub trait PollSource: Send {
    /// Add a receive operation for this source to `select` and return its
    /// operation index.
    fn register<'a>(&'a self, select: &mut Select<'a>) -> usize;

    /// Whether a source just reported ready is ready only because it can
    /// never produce again. Closed application sources are detached.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<T: Send> PollSource for Receiver<T> {
    fn register<'a>(&'a self, select: &mut Select<'a>) -> usize {
        select.recv(self)
    }

    /// A buffered receiver that is ready with nothing queued has lost every
    /// sender. Rendezvous channels cannot be told apart and never count as
    /// closed.
    fn is_closed(&self) -> bool {
        self.is_empty() && self.capacity() != Some(0)
    }
}

/// Outcome of one [`Looper::poll_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// The source registered under this identifier has data (or closed).
    Ready(LooperId),
    /// [`LooperWaker::wake`] was called.
    Woken,
    /// Nothing fired within the timeout.
    Timeout,
}

struct Registration {
    ident: LooperId,
    source: Box<dyn PollSource>,
}

/// Registry of poll sources plus the blocking wait over them.
pub struct Looper {
    sources: Vec<Registration>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for Looper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Looper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idents: Vec<_> = self.sources.iter().map(|r| r.ident).collect();
        f.debug_struct("Looper").field("sources", &idents).finish_non_exhaustive()
    }
}

impl Looper {
    /// Looper with no sources besides its wake channel.
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self { sources: Vec::new(), wake_tx, wake_rx }
    }

    /// Register a source under any identifier, reserved ones included.
    pub(crate) fn attach(
        &mut self,
        ident: LooperId,
        source: impl PollSource + 'static,
    ) -> Result<(), BridgeError> {
        if self.contains(ident) {
            return Err(BridgeError::DuplicateIdent(ident));
        }
        self.sources.push(Registration { ident, source: Box::new(source) });
        tracing::trace!(%ident, "poll source attached");
        Ok(())
    }

    /// Register an application source.
    ///
    /// # Errors
    ///
    /// - `BridgeError::ReservedIdent` if `ident` is below [`LooperId::USER`]
    /// - `BridgeError::DuplicateIdent` if `ident` is already registered
    pub fn add_source(
        &mut self,
        ident: LooperId,
        source: impl PollSource + 'static,
    ) -> Result<(), BridgeError> {
        if ident.is_reserved() {
            return Err(BridgeError::ReservedIdent(ident));
        }
        self.attach(ident, source)
    }

    /// Deregister a source. Returns whether it was registered.
    pub fn remove_source(&mut self, ident: LooperId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|r| r.ident != ident);
        let removed = self.sources.len() != before;
        if removed {
            tracing::trace!(%ident, "poll source detached");
        }
        removed
    }

    /// Whether a source is registered under `ident`.
    pub fn contains(&self, ident: LooperId) -> bool {
        self.sources.iter().any(|r| r.ident == ident)
    }

    /// Number of registered sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Handle that interrupts a blocked [`Looper::poll_once`] from any thread.
    pub fn waker(&self) -> LooperWaker {
        LooperWaker { tx: self.wake_tx.clone() }
    }

    /// Block until a source is ready, the looper is woken, or `timeout`
    /// elapses. `None` waits without bound.
    ///
    /// An application source whose senders are all gone is reported ready
    /// one last time and detached, so it cannot keep the looper spinning.
    /// Application sources must only be drained on the looper's thread.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> Poll {
        let mut select = Select::new();
        let wake_index = select.recv(&self.wake_rx);
        let mut indices = Vec::with_capacity(self.sources.len());
        for registration in &self.sources {
            indices.push((registration.source.register(&mut select), registration.ident));
        }

        let ready = match timeout {
            Some(timeout) => match select.ready_timeout(timeout) {
                Ok(index) => index,
                Err(_) => return Poll::Timeout,
            },
            None => select.ready(),
        };

        drop(select);

        if ready == wake_index {
            while self.wake_rx.try_recv().is_ok() {}
            return Poll::Woken;
        }

        let Some((_, ident)) = indices.into_iter().find(|(index, _)| *index == ready) else {
            return Poll::Timeout;
        };

        let closed = !ident.is_reserved()
            && self.sources.iter().any(|r| r.ident == ident && r.source.is_closed());
        if closed {
            tracing::debug!(%ident, "poll source closed, detaching");
            self.remove_source(ident);
        }
        Poll::Ready(ident)
    }
}

/// Cross-thread wake handle for a [`Looper`].
#[derive(Debug, Clone)]
pub struct LooperWaker {
    tx: Sender<()>,
}

impl LooperWaker {
    /// Make the looper's current or next `poll_once` return [`Poll::Woken`].
    ///
    /// Wakes coalesce: several calls before the looper runs produce one
    /// `Woken`.
    pub fn wake(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {},
            Err(TrySendError::Disconnected(())) => {
                tracing::trace!("wake dropped, looper gone");
            },
        }
    }
}
