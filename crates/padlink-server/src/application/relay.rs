//! Screen relay: fan-out of binary frames from a producer to mirror consumers.
//!
//! Each connection owns a [`ConsumerHandle`]: the sending half of its writer
//! task's queue plus a counter of bytes queued but not yet written.  A
//! consumer whose counter is over the limit misses frames until its writer
//! catches up; it is never disconnected for being slow.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// One item for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

impl Outbound {
    /// Bytes this item adds to the connection's buffered count.
    pub fn byte_len(&self) -> usize {
        match self {
            Outbound::Text(text) => text.len(),
            Outbound::Binary(bytes) => bytes.len(),
            Outbound::Close => 0,
        }
    }
}

/// Write side of one connection, shared between its tasks and the relay.
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    id: Uuid,
    outbound: mpsc::UnboundedSender<Outbound>,
    buffered: Arc<AtomicUsize>,
}

impl ConsumerHandle {
    /// Creates a handle and the receiver its writer task drains.
    pub fn new(id: Uuid) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id,
            outbound,
            buffered: Arc::new(AtomicUsize::new(0)),
        };
        (handle, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queues an item.  Returns `false` once the writer has gone away.
    pub fn send(&self, item: Outbound) -> bool {
        let len = item.byte_len();
        self.buffered.fetch_add(len, Ordering::AcqRel);
        if self.outbound.send(item).is_err() {
            self.buffered.fetch_sub(len, Ordering::AcqRel);
            return false;
        }
        true
    }

    pub fn send_text(&self, text: String) -> bool {
        self.send(Outbound::Text(text))
    }

    /// Called by the writer once `len` bytes have been written to the socket.
    pub fn mark_flushed(&self, len: usize) {
        // Saturating: a racing `send` failure may already have subtracted.
        let _ = self
            .buffered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(len)));
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Asks the writer to send a close frame and stop.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Outcome of relaying one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    /// Consumers over the backpressure limit that missed this frame.
    pub skipped: usize,
}

pub struct ScreenRelay {
    consumers: RwLock<HashMap<Uuid, ConsumerHandle>>,
    limit: usize,
}

impl ScreenRelay {
    /// `limit` is the per-consumer buffered byte ceiling.
    pub fn new(limit: usize) -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
            limit,
        }
    }

    pub fn start_mirror(&self, handle: ConsumerHandle) {
        let id = handle.id();
        self.consumers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);
        debug!("connection {id}: mirroring");
    }

    /// Returns whether `id` was mirroring.
    pub fn stop_mirror(&self, id: Uuid) -> bool {
        let removed = self
            .consumers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!("connection {id}: mirroring stopped");
        }
        removed
    }

    /// Sends `frame` to every consumer except `from`.
    pub fn relay(&self, from: Uuid, frame: &[u8]) -> RelayReport {
        let mut report = RelayReport::default();
        let mut gone = Vec::new();
        {
            let consumers = self.consumers.read().unwrap_or_else(PoisonError::into_inner);
            for (id, consumer) in consumers.iter().filter(|(id, _)| **id != from) {
                if consumer.buffered_bytes() > self.limit {
                    trace!("connection {id}: frame skipped, {} bytes queued", consumer.buffered_bytes());
                    report.skipped += 1;
                    continue;
                }
                if consumer.send(Outbound::Binary(frame.to_vec())) {
                    report.delivered += 1;
                } else {
                    gone.push(*id);
                }
            }
        }
        if !gone.is_empty() {
            let mut consumers = self.consumers.write().unwrap_or_else(PoisonError::into_inner);
            for id in gone {
                consumers.remove(&id);
            }
        }
        report
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
