//! A single subscription entry as the Sublist sees it.

use broker_protocol::Subject;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity used for pointer-identity removal (spec.md §4.1: "by
/// pointer-identity match, not by value equality — two subs on the same
/// subject are distinct"). `Arc::ptr_eq` would work too, but a counter is
/// cheaper to compare and to carry across an `mpsc` channel.
pub type SubId = u64;

/// One subscription, as held inside the Sublist trie.
///
/// `sid` is the connection-local subscriber id from the wire protocol
/// (opaque to the Sublist, used by the connection to route a delivered
/// message back to the right local handle); `id` is the Sublist's own
/// identity for this entry, used for removal and queue-fairness bookkeeping.
///
/// `max_msgs`/`delivered` implement `UNSUB <sid> <max>` (spec.md §4.2): any
/// connection delivering to this subscription bumps `delivered`, and the one
/// whose bump reaches `max_msgs` is responsible for removing it from the
/// owning Sublist — so the count lives on the shared entry rather than on
/// the (possibly different) connection that owns it.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubId,
    pub subject: Subject,
    pub queue: Option<Box<str>>,
    pub sid: Box<[u8]>,
    pub conn_id: u64,
    pub max_msgs: Option<u64>,
    delivered: AtomicU64,
}

impl Subscription {
    pub fn new(subject: Subject, queue: Option<Box<str>>, sid: Box<[u8]>, conn_id: u64) -> Subscription {
        Subscription::with_max(subject, queue, sid, conn_id, None)
    }

    pub fn with_max(
        subject: Subject,
        queue: Option<Box<str>>,
        sid: Box<[u8]>,
        conn_id: u64,
        max_msgs: Option<u64>,
    ) -> Subscription {
        Subscription {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            subject,
            queue,
            sid,
            conn_id,
            max_msgs,
            delivered: AtomicU64::new(0),
        }
    }

    /// Bumps the delivery count and reports whether this delivery was the
    /// one that reached `max_msgs` — the caller must then remove this
    /// subscription from the Sublist. Always `false` when unbounded.
    pub fn mark_delivered(&self) -> bool {
        match self.max_msgs {
            None => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(max) => {
                let prev = self.delivered.fetch_add(1, Ordering::Relaxed);
                prev + 1 >= max
            }
        }
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Subscription {}
