//! Authorization: the three auth modes from spec.md §4.5 and the
//! per-connection publish/subscribe permission checks layered on top.

mod mode;
mod permissions;
mod user;

pub use mode::AuthMode;
pub use permissions::{PermCache, PermissionSublists};
pub use user::{constant_time_eq, PasswordEntry, PermissionsConfig, User, UserTable, HASH_PREFIX};
