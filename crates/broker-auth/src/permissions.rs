//! Per-connection publish/subscribe permission checks.
//!
//! Publish subjects on the wire are always literal, so the publish
//! allow-list is materialized into an ordinary [`Sublist`] and checked with
//! its own wildcard-matching `match_subject` — the same lookup the Sublist
//! already does for real publish delivery. A `SUB`'s subject is not
//! necessarily literal (`SUB reports.* 1` is legal), and `Sublist::match_subject`
//! always reports no match for a wildcard-carrying query subject (it's built
//! to match literal publishes against stored patterns, not pattern against
//! pattern), so the subscribe allow-list is instead checked with
//! [`Subject::is_subset_of`]: a `SUB` is allowed when its subject's entire
//! match set is contained in at least one allow-list entry's match set.

use crate::user::PermissionsConfig;
use broker_protocol::Subject;
use broker_sublist::{Sublist, Subscription};
use std::collections::HashMap;
use std::sync::Arc;

/// The permission state materialized for one connection on successful auth
/// (spec.md §4.5). `None` means "no permission config was set for this
/// user" — everything is allowed.
pub struct PermissionSublists {
    publish: Option<Sublist>,
    subscribe: Option<Vec<Subject>>,
}

impl PermissionSublists {
    pub fn unrestricted() -> PermissionSublists {
        PermissionSublists {
            publish: None,
            subscribe: None,
        }
    }

    pub fn from_config(config: &PermissionsConfig, conn_id: u64) -> PermissionSublists {
        let build_publish = |patterns: &[String]| -> Option<Sublist> {
            if patterns.is_empty() {
                return None;
            }
            let sl = Sublist::new();
            for (idx, pattern) in patterns.iter().enumerate() {
                if let Ok(subject) = Subject::parse(pattern) {
                    sl.insert(Arc::new(Subscription::new(
                        subject,
                        None,
                        idx.to_string().into_bytes().into_boxed_slice(),
                        conn_id,
                    )));
                }
            }
            Some(sl)
        };
        let build_subscribe = |patterns: &[String]| -> Option<Vec<Subject>> {
            if patterns.is_empty() {
                return None;
            }
            Some(patterns.iter().filter_map(|p| Subject::parse(p).ok()).collect())
        };
        PermissionSublists {
            publish: build_publish(&config.publish),
            subscribe: build_subscribe(&config.subscribe),
        }
    }

    pub fn allows_publish(&self, subject: &Subject) -> bool {
        match &self.publish {
            None => true,
            Some(sl) => !sl.match_subject(subject).is_empty(),
        }
    }

    pub fn allows_subscribe(&self, subject: &Subject) -> bool {
        match &self.subscribe {
            None => true,
            Some(patterns) => patterns.iter().any(|allowed| subject.is_subset_of(allowed)),
        }
    }
}

/// A small recent-checks cache (spec.md §4.5), avoiding a Sublist match
/// for the same subject on every single publish from a chatty client.
/// Capacity-bounded; cleared wholesale on overflow like the Sublist's own
/// cache, for the same reason (simplicity over precision — correctness
/// doesn't depend on retention).
pub struct PermCache {
    publish: HashMap<Box<[u8]>, bool>,
    subscribe: HashMap<Box<[u8]>, bool>,
    capacity: usize,
}

impl PermCache {
    pub fn new(capacity: usize) -> PermCache {
        PermCache {
            publish: HashMap::new(),
            subscribe: HashMap::new(),
            capacity,
        }
    }

    pub fn check_publish(&mut self, perms: &PermissionSublists, subject: &Subject) -> bool {
        Self::check(&mut self.publish, self.capacity, perms, subject, PermissionSublists::allows_publish)
    }

    pub fn check_subscribe(&mut self, perms: &PermissionSublists, subject: &Subject) -> bool {
        Self::check(&mut self.subscribe, self.capacity, perms, subject, PermissionSublists::allows_subscribe)
    }

    fn check(
        cache: &mut HashMap<Box<[u8]>, bool>,
        capacity: usize,
        perms: &PermissionSublists,
        subject: &Subject,
        check_fn: impl Fn(&PermissionSublists, &Subject) -> bool,
    ) -> bool {
        let key = subject.literal_bytes().into_boxed_slice();
        if let Some(allowed) = cache.get(&key) {
            return *allowed;
        }
        let allowed = check_fn(perms, subject);
        if cache.len() >= capacity {
            cache.clear();
        }
        cache.insert(key, allowed);
        allowed
    }
}

impl Default for PermCache {
    fn default() -> Self {
        PermCache::new(256)
    }
}
