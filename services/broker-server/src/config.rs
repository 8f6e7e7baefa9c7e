//! TOML config loading, merged with CLI overrides in `main.rs`.
//!
//! TOML is the config file format; every field has a default, so a config
//! file is optional. Grounded on the raw-then-validated split in
//! `services/forwarder/src/config.rs` of the timing-system teacher.

use broker_auth::{AuthMode, PasswordEntry, PermissionsConfig, User, UserTable};
use broker_core::{ServerOptions, DEFAULT_MAX_CONTROL_LINE, DEFAULT_MAX_PAYLOAD};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RawConfig {
    host: Option<String>,
    port: Option<u16>,
    max_connections: Option<usize>,
    max_payload: Option<usize>,
    max_control_line: Option<usize>,
    ping_interval_secs: Option<u64>,
    max_pings_out: Option<u32>,
    write_deadline_secs: Option<u64>,
    authorization: Option<RawAuth>,
}

#[derive(Debug, Deserialize)]
struct RawAuth {
    token: Option<String>,
    user: Option<String>,
    password: Option<String>,
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    user: String,
    password: String,
    #[serde(default)]
    publish: Vec<String>,
    #[serde(default)]
    subscribe: Vec<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load_options_from_path(path: &Path) -> Result<ServerOptions, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_options_from_str(&toml_str)
}

pub fn load_options_from_str(toml_str: &str) -> Result<ServerOptions, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = ServerOptions::default();

    let host = match raw.host {
        Some(h) => h.parse::<IpAddr>().map_err(|e| ConfigError::InvalidValue(format!("host: {e}")))?,
        None => defaults.host,
    };

    let auth = match raw.authorization {
        None => AuthMode::Open,
        Some(a) if !a.users.is_empty() => {
            let mut table = UserTable::new();
            for u in a.users {
                let permissions = if u.publish.is_empty() && u.subscribe.is_empty() {
                    None
                } else {
                    Some(PermissionsConfig {
                        publish: u.publish,
                        subscribe: u.subscribe,
                    })
                };
                table.insert(User {
                    username: u.user,
                    password: PasswordEntry::parse(&u.password),
                    permissions,
                });
            }
            AuthMode::MultiUser(table)
        }
        Some(a) => match (a.user, a.password, a.token) {
            (Some(username), Some(password), None) => AuthMode::SingleUser {
                username,
                password: PasswordEntry::parse(&password),
            },
            (None, None, Some(token)) => AuthMode::Token(token),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "[authorization] needs `users`, a `user`/`password` pair, or a `token`".into(),
                ))
            }
        },
    };

    Ok(ServerOptions {
        host,
        port: raw.port.unwrap_or(defaults.port),
        max_conn: raw.max_connections.unwrap_or(defaults.max_conn),
        max_payload: raw.max_payload.unwrap_or(DEFAULT_MAX_PAYLOAD),
        max_control_line: raw.max_control_line.unwrap_or(DEFAULT_MAX_CONTROL_LINE),
        ping_interval: raw.ping_interval_secs.map(Duration::from_secs).unwrap_or(defaults.ping_interval),
        max_pings_out: raw.max_pings_out.unwrap_or(defaults.max_pings_out),
        write_deadline: raw.write_deadline_secs.map(Duration::from_secs).unwrap_or(defaults.write_deadline),
        auth_timeout: defaults.auth_timeout,
        auth,
        write_channel_capacity: defaults.write_channel_capacity,
    })
}
