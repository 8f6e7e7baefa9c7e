//! The server's live-connection directory.
//!
//! Delivery is direct: the connection that runs `PUB` looks up each
//! matched subscriber's [`ConnectionHandle`] here and pushes the rendered
//! `MSG` frame straight onto that subscriber's outbound channel. This
//! stands in for the source's per-connection pending-flush set — see
//! DESIGN.md — with the channel's bounded capacity as the backpressure
//! signal instead of a byte-length threshold.

use broker_protocol::ConnKind;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: u64,
    pub kind: ConnKind,
    tx: mpsc::Sender<Bytes>,
    kill: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(id: u64, kind: ConnKind, tx: mpsc::Sender<Bytes>, kill: Arc<Notify>) -> ConnectionHandle {
        ConnectionHandle { id, kind, tx, kill }
    }

    /// Attempts to hand a frame to this connection's writer task without
    /// blocking. A full channel means the subscriber is a slow consumer;
    /// the caller must follow up with [`ConnectionHandle::mark_slow_consumer`]
    /// to actually tear the connection down.
    pub fn try_deliver(&self, frame: Bytes) -> bool {
        self.tx.try_send(frame).is_ok()
    }

    /// Wakes this connection's read loop so it closes itself, drops its
    /// subscriptions, and unregisters — the slow-consumer disconnect from
    /// spec.md §4.3.
    pub fn mark_slow_consumer(&self) {
        self.kill.notify_one();
    }
}

#[derive(Default)]
pub struct Registry {
    clients: RwLock<HashMap<u64, ConnectionHandle>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, handle: ConnectionHandle) {
        self.clients.write().expect("registry lock poisoned").insert(handle.id, handle);
    }

    pub fn unregister(&self, id: u64) {
        self.clients.write().expect("registry lock poisoned").remove(&id);
    }

    pub fn get(&self, id: u64) -> Option<ConnectionHandle> {
        self.clients.read().expect("registry lock poisoned").get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
