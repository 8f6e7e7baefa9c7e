//! User table and password comparison for multi-user/single-user auth.
//!
//! Grounded on the SHA-256 digest comparison in
//! `services/server/src/auth.rs` of the timing-system teacher, adapted
//! from "hash a bearer token and look it up" to "store a hash, compare a
//! plaintext candidate against it".

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Stored values beginning with this prefix are treated as a hex-encoded
/// SHA-256 digest rather than a plaintext password (spec.md §4.5:
/// "hashed compare when the stored value begins with the hash prefix").
pub const HASH_PREFIX: &str = "$sha256$";

#[derive(Debug, Clone)]
pub enum PasswordEntry {
    Plain(String),
    Hashed(String),
}

impl PasswordEntry {
    pub fn parse(stored: &str) -> PasswordEntry {
        match stored.strip_prefix(HASH_PREFIX) {
            Some(digest) => PasswordEntry::Hashed(digest.to_lowercase()),
            None => PasswordEntry::Plain(stored.to_string()),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        match self {
            PasswordEntry::Plain(expected) => constant_time_eq(expected.as_bytes(), candidate.as_bytes()),
            PasswordEntry::Hashed(expected) => {
                let digest = hex::encode(Sha256::digest(candidate.as_bytes()));
                constant_time_eq(expected.as_bytes(), digest.as_bytes())
            }
        }
    }
}

/// Byte-for-byte comparison that doesn't short-circuit on the first
/// mismatch, so password/token checks don't leak timing information
/// about how many leading bytes matched.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Subject patterns a user is allowed to publish/subscribe to. Kept as
/// raw subscribe-style strings here; `broker-core` materializes these
/// into per-connection Sublists on successful auth (spec.md §4.5).
#[derive(Debug, Clone, Default)]
pub struct PermissionsConfig {
    pub publish: Vec<String>,
    pub subscribe: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub password: PasswordEntry,
    pub permissions: Option<PermissionsConfig>,
}

/// The multi-user mode's username → User mapping.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: HashMap<String, User>,
}

impl UserTable {
    pub fn new() -> UserTable {
        UserTable::default()
    }

    pub fn insert(&mut self, user: User) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn get(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_password_verifies() {
        let p = PasswordEntry::parse("good");
        assert!(p.verify("good"));
        assert!(!p.verify("bad"));
    }

    #[test]
    fn hashed_password_verifies() {
        let digest = hex::encode(Sha256::digest(b"good"));
        let stored = format!("{HASH_PREFIX}{digest}");
        let p = PasswordEntry::parse(&stored);
        assert!(matches!(p, PasswordEntry::Hashed(_)));
        assert!(p.verify("good"));
        assert!(!p.verify("bad"));
    }

    #[test]
    fn user_table_lookup() {
        let mut t = UserTable::new();
        t.insert(User {
            username: "u".into(),
            password: PasswordEntry::parse("good"),
            permissions: None,
        });
        assert!(t.get("u").is_some());
        assert!(t.get("nobody").is_none());
    }
}
