//! The subject-matching engine: a wildcard-aware trie with a
//! generation-stamped result cache, shared by every connection on the
//! server behind a single readers-writer lock.
//!
//! Grounded on the accept-loop/shared-registry pattern in
//! `services/server/src/state.rs` of the timing-system teacher this crate
//! was adapted from: a `RwLock`-guarded structure that many connection
//! tasks read concurrently and a few mutate.

mod subscription;
mod trie;

pub use subscription::{SubId, Subscription};

use broker_protocol::Subject;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use trie::Level;

/// Sublist's own error type. Only ever raised by `remove`.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SublistError {
    #[error("sublist: no matches found")]
    NotFound,
}

/// The result of a `match`, shaped for cheap queue-group delivery: plain
/// subscriptions get the message directly, and each queue group is kept
/// as its own bucket so the caller can draw one member per group.
#[derive(Debug, Clone, Default)]
pub struct SublistResult {
    pub psubs: Vec<Arc<Subscription>>,
    pub qsubs: Vec<(Box<str>, Vec<Arc<Subscription>>)>,
}

impl SublistResult {
    pub fn is_empty(&self) -> bool {
        self.psubs.is_empty() && self.qsubs.is_empty()
    }
}

struct CacheEntry {
    genid: u64,
    result: Arc<SublistResult>,
}

/// Suggested bound from spec.md §4.1; any eviction policy that preserves
/// `genid` coherence is correct, so a full clear on overflow is fine.
const CACHE_BOUND: usize = 1024;

struct Inner {
    genid: u64,
    cache: HashMap<Box<[u8]>, CacheEntry>,
    root: Level,
    count: u32,
}

/// Point-in-time counters, exposed for observability (spec.md §4.1: bump
/// on insert/remove/match/cache-hit).
#[derive(Debug, Clone, Copy, Default)]
pub struct SublistStats {
    pub matches: u64,
    pub cache_hits: u64,
    pub inserts: u64,
    pub removes: u64,
    pub count: u32,
}

/// The shared subject-matching structure. `match_subject` takes a shared
/// lock; `insert`/`remove` take an exclusive one, per spec.md §4.1's
/// concurrency note.
pub struct Sublist {
    inner: RwLock<Inner>,
    matches: AtomicUsize,
    cache_hits: AtomicUsize,
    inserts: AtomicUsize,
    removes: AtomicUsize,
}

impl Default for Sublist {
    fn default() -> Self {
        Self::new()
    }
}

impl Sublist {
    pub fn new() -> Sublist {
        Sublist {
            inner: RwLock::new(Inner {
                genid: 0,
                cache: HashMap::new(),
                root: Level::default(),
                count: 0,
            }),
            matches: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, sub: Arc<Subscription>) {
        let mut inner = self.inner.write().expect("sublist lock poisoned");
        trie::insert(&mut inner.root, sub.subject.tokens(), sub);
        inner.count += 1;
        inner.genid += 1;
        inner.cache.clear();
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remove(&self, sub: &Subscription) -> Result<(), SublistError> {
        let mut inner = self.inner.write().expect("sublist lock poisoned");
        if !trie::remove(&mut inner.root, sub.subject.tokens(), sub) {
            return Err(SublistError::NotFound);
        }
        inner.count -= 1;
        inner.genid += 1;
        inner.cache.clear();
        self.removes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Matches a fully-literal publish subject. A subject carrying a
    /// wildcard token never matches anything (spec.md §4.1) rather than
    /// erroring — publishers are expected to have already rejected those
    /// at the protocol boundary via `Subject::parse_literal`.
    pub fn match_subject(&self, subject: &Subject) -> Arc<SublistResult> {
        self.matches.fetch_add(1, Ordering::Relaxed);
        if subject.has_wildcard() {
            return Arc::new(SublistResult::default());
        }
        let key = subject.literal_bytes().into_boxed_slice();

        {
            let inner = self.inner.read().expect("sublist lock poisoned");
            if let Some(entry) = inner.cache.get(&key) {
                if entry.genid == inner.genid {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    return entry.result.clone();
                }
            }
        }

        let mut inner = self.inner.write().expect("sublist lock poisoned");
        // Re-check under the write lock: another writer may have filled
        // the cache (or bumped genid) between the read above and here.
        if let Some(entry) = inner.cache.get(&key) {
            if entry.genid == inner.genid {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                return entry.result.clone();
            }
        }

        let tokens: Vec<&[u8]> = subject
            .tokens()
            .iter()
            .map(|t| t.as_literal().expect("checked non-wildcard above").as_bytes())
            .collect();
        let mut psubs = Vec::new();
        let mut qsubs_map: HashMap<Box<str>, Vec<Arc<Subscription>>> = HashMap::new();
        trie::walk_match(&inner.root, &tokens, &mut psubs, &mut qsubs_map);
        let result = Arc::new(SublistResult {
            psubs,
            qsubs: qsubs_map.into_iter().collect(),
        });

        if inner.cache.len() >= CACHE_BOUND {
            inner.cache.clear();
        }
        let genid = inner.genid;
        inner.cache.insert(
            key,
            CacheEntry {
                genid,
                result: result.clone(),
            },
        );
        result
    }

    pub fn stats(&self) -> SublistStats {
        let inner = self.inner.read().expect("sublist lock poisoned");
        SublistStats {
            matches: self.matches.load(Ordering::Relaxed) as u64,
            cache_hits: self.cache_hits.load(Ordering::Relaxed) as u64,
            inserts: self.inserts.load(Ordering::Relaxed) as u64,
            removes: self.removes.load(Ordering::Relaxed) as u64,
            count: inner.count,
        }
    }

    pub fn count(&self) -> u32 {
        self.inner.read().expect("sublist lock poisoned").count
    }
}

/// Picks one member of a queue-group bucket by uniform random draw, per
/// the delivery-selection rule in spec.md §4.1.
pub fn pick_queue_member(bucket: &[Arc<Subscription>]) -> Option<&Arc<Subscription>> {
    if bucket.is_empty() {
        return None;
    }
    let idx = rand::random::<usize>() % bucket.len();
    bucket.get(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(subject: &str, queue: Option<&str>, sid: &str) -> Arc<Subscription> {
        Arc::new(Subscription::new(
            Subject::parse(subject).unwrap(),
            queue.map(|q| q.into()),
            sid.as_bytes().into(),
            1,
        ))
    }

    fn names(result: &SublistResult) -> Vec<Box<[u8]>> {
        let mut v: Vec<Box<[u8]>> = result.psubs.iter().map(|s| s.sid.clone()).collect();
        v.sort();
        v
    }

    #[test]
    fn star_matches_single_token() {
        let sl = Sublist::new();
        sl.insert(sub("foo.*", None, "1"));
        let m = sl.match_subject(&Subject::parse_literal("foo.bar").unwrap());
        assert_eq!(names(&m), vec![b"1".to_vec().into_boxed_slice()]);
        assert!(sl
            .match_subject(&Subject::parse_literal("foo.bar.baz").unwrap())
            .is_empty());
        assert!(sl.match_subject(&Subject::parse_literal("foo").unwrap()).is_empty());
    }

    #[test]
    fn full_wildcard_matches_trailing_tokens_not_prefix_alone() {
        let sl = Sublist::new();
        sl.insert(sub("a.>", None, "1"));
        assert!(sl.match_subject(&Subject::parse_literal("a").unwrap()).is_empty());
        assert!(!sl.match_subject(&Subject::parse_literal("a.b").unwrap()).is_empty());
        assert!(!sl.match_subject(&Subject::parse_literal("a.b.c").unwrap()).is_empty());
    }

    #[test]
    fn bare_full_wildcard_matches_everything() {
        let sl = Sublist::new();
        sl.insert(sub(">", None, "1"));
        assert!(!sl.match_subject(&Subject::parse_literal("x").unwrap()).is_empty());
        assert!(!sl.match_subject(&Subject::parse_literal("x.y.z").unwrap()).is_empty());
    }

    #[test]
    fn e1_subscribe_star_publish_literal() {
        let sl = Sublist::new();
        sl.insert(sub("foo.*", None, "1"));
        let m = sl.match_subject(&Subject::parse_literal("foo.bar").unwrap());
        assert_eq!(m.psubs.len(), 1);
        assert_eq!(&*m.psubs[0].sid, b"1");
    }

    #[test]
    fn e2_overlapping_wildcard_and_literal_subscriptions_both_fire() {
        let sl = Sublist::new();
        sl.insert(sub("a.>", None, "1"));
        sl.insert(sub("a.b.c", None, "2"));
        let m = sl.match_subject(&Subject::parse_literal("a.b.c").unwrap());
        assert_eq!(m.psubs.len(), 2);
    }

    #[test]
    fn e3_queue_group_picks_exactly_one() {
        let sl = Sublist::new();
        sl.insert(sub("work", Some("q1"), "1"));
        sl.insert(sub("work", Some("q1"), "2"));
        let m = sl.match_subject(&Subject::parse_literal("work").unwrap());
        assert_eq!(m.qsubs.len(), 1);
        let (_, bucket) = &m.qsubs[0];
        assert_eq!(bucket.len(), 2);
        assert!(pick_queue_member(bucket).is_some());
    }

    #[test]
    fn insert_remove_symmetry() {
        let sl = Sublist::new();
        let s = sub("foo.bar", None, "1");
        sl.insert(s.clone());
        assert_eq!(sl.count(), 1);
        sl.remove(&s).unwrap();
        assert_eq!(sl.count(), 0);
        assert!(sl.match_subject(&Subject::parse_literal("foo.bar").unwrap()).is_empty());
    }

    #[test]
    fn remove_missing_subscription_fails_not_found() {
        let sl = Sublist::new();
        let s = sub("foo.bar", None, "1");
        assert_eq!(sl.remove(&s), Err(SublistError::NotFound));
    }

    #[test]
    fn remove_prunes_empty_nodes() {
        let sl = Sublist::new();
        let s = sub("a.b.c", None, "1");
        sl.insert(s.clone());
        sl.remove(&s).unwrap();
        sl.insert(sub("a.b.c", None, "2"));
        assert_eq!(sl.count(), 1);
        assert_eq!(sl.match_subject(&Subject::parse_literal("a.b.c").unwrap()).psubs.len(), 1);
    }

    #[test]
    fn cache_is_coherent_across_mutation() {
        let sl = Sublist::new();
        sl.insert(sub("foo", None, "1"));
        let first = sl.match_subject(&Subject::parse_literal("foo").unwrap());
        assert_eq!(first.psubs.len(), 1);
        sl.insert(sub("foo", None, "2"));
        let second = sl.match_subject(&Subject::parse_literal("foo").unwrap());
        assert_eq!(second.psubs.len(), 2, "stale cached result must not survive an insert");
    }

    #[test]
    fn two_subs_same_subject_are_distinct_by_identity() {
        let sl = Sublist::new();
        let a = sub("foo", None, "1");
        let b = sub("foo", None, "1");
        sl.insert(a.clone());
        sl.insert(b.clone());
        assert_eq!(sl.count(), 2);
        sl.remove(&a).unwrap();
        assert_eq!(sl.count(), 1);
        assert_eq!(sl.match_subject(&Subject::parse_literal("foo").unwrap()).psubs.len(), 1);
    }

    #[test]
    fn wildcard_publish_subject_never_matches() {
        let sl = Sublist::new();
        sl.insert(sub("foo.*", None, "1"));
        let wildcard_query = Subject::parse("foo.*").unwrap();
        assert!(sl.match_subject(&wildcard_query).is_empty());
    }
}
