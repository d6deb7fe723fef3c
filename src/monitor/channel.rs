//! Observable value with ordered, lossless delivery to every subscriber.
//!
//! A [`Channel`] holds the current value and an observer list with one
//! unbounded `tokio::sync::mpsc` sender per [`Subscription`]. A new
//! subscription first yields the value current at subscribe time, then each
//! later publication in order. A slow subscriber buffers instead of losing
//! values. Setting the value and sending it happen under one lock, so a
//! subscriber can neither miss nor duplicate a publication that races with
//! its subscribe call. Dropped subscriptions are pruned on the next send.

// ============================================================================
// Imports
// ============================================================================

use futures_util::Stream;
use futures_util::stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::{Error, Result};

// ============================================================================
// Channel
// ============================================================================

struct Slot<T> {
    current: T,
    observers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Slot<T> {
    fn set(&mut self, value: T) {
        self.observers.retain(|tx| tx.send(value.clone()).is_ok());
        self.current = value;
    }
}

/// Current value plus change broadcast.
pub struct Channel<T> {
    slot: Mutex<Slot<T>>,
}

impl<T: Clone> Channel<T> {
    /// Creates a channel holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            slot: Mutex::new(Slot {
                current: initial,
                observers: Vec::new(),
            }),
        }
    }

    /// Returns the current value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> T {
        self.slot.lock().current.clone()
    }

    /// Sets and broadcasts `value`, even if unchanged.
    pub fn publish(&self, value: T) {
        self.slot.lock().set(value);
    }

    /// Subscribes; the first item is the current value.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let mut slot = self.slot.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, send cannot fail.
        let _ = tx.send(slot.current.clone());
        slot.observers.push(tx);
        Subscription { rx }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut slot = self.slot.lock();
        slot.observers.retain(|tx| !tx.is_closed());
        slot.observers.len()
    }
}

impl<T: Clone + PartialEq> Channel<T> {
    /// Sets and broadcasts `value` only if it differs from the current one.
    ///
    /// Returns `true` if a publication happened.
    pub fn publish_if_changed(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.current == value {
            return false;
        }
        slot.set(value);
        true
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Receiving end of a [`Channel`].
///
/// Buffers every publication until read. Yields [`Error::ChannelClosed`]
/// once the owning monitor is dropped and the buffer is empty.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Waits for the next value.
    pub async fn recv(&mut self) -> Result<T> {
        self.rx.recv().await.ok_or(Error::ChannelClosed)
    }

    /// Returns the next value if one is ready.
    pub fn try_recv(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::ChannelClosed)),
        }
    }

    /// Collects every value ready right now.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(value) = self.rx.try_recv() {
            values.push(value);
        }
        values
    }

    /// Number of values buffered and not yet read.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl<T: Send + 'static> Subscription<T> {
    /// Adapts the subscription into a stream ending when the channel closes.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .ok()
                .map(|value| (Ok(value), subscription))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
