//! The three mutually exclusive authorization modes from spec.md §4.5.

use crate::permissions::PermissionSublists;
use crate::user::{PasswordEntry, UserTable};
use broker_protocol::{ConnectOpts, ProtocolError};

#[derive(Debug, Clone)]
pub enum AuthMode {
    /// No authentication configured; every `CONNECT` is accepted.
    Open,
    MultiUser(UserTable),
    SingleUser { username: String, password: PasswordEntry },
    Token(String),
}

impl AuthMode {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, AuthMode::Open)
    }

    /// Checks a decoded `CONNECT` document against this mode. On success,
    /// returns the permission Sublists to install on the connection (`None`
    /// permissions under multi-user means that user has no restrictions).
    pub fn authenticate(&self, opts: &ConnectOpts, conn_id: u64) -> Result<PermissionSublists, ProtocolError> {
        match self {
            AuthMode::Open => Ok(PermissionSublists::unrestricted()),
            AuthMode::SingleUser { username, password } => {
                let ok = opts.user.as_deref() == Some(username.as_str())
                    && opts.pass.as_deref().is_some_and(|p| password.verify(p));
                if ok {
                    Ok(PermissionSublists::unrestricted())
                } else {
                    Err(ProtocolError::AuthorizationViolation)
                }
            }
            AuthMode::Token(expected) => {
                let ok = opts
                    .auth_token
                    .as_deref()
                    .is_some_and(|t| crate::user::constant_time_eq(t.as_bytes(), expected.as_bytes()));
                if ok {
                    Ok(PermissionSublists::unrestricted())
                } else {
                    Err(ProtocolError::AuthorizationViolation)
                }
            }
            AuthMode::MultiUser(table) => {
                let username = opts.user.as_deref().ok_or(ProtocolError::AuthorizationViolation)?;
                let user = table.get(username).ok_or(ProtocolError::AuthorizationViolation)?;
                let ok = opts.pass.as_deref().is_some_and(|p| user.password.verify(p));
                if !ok {
                    return Err(ProtocolError::AuthorizationViolation);
                }
                match &user.permissions {
                    Some(config) => Ok(PermissionSublists::from_config(config, conn_id)),
                    None => Ok(PermissionSublists::unrestricted()),
                }
            }
        }
    }
}
