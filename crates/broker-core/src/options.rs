//! Server-wide options, published as an immutable copy-on-write snapshot.
//!
//! Grounded on `services/forwarder/src/config.rs`'s raw-then-validated
//! config split in the timing-system teacher, minus the raw/validated
//! two-step (this layer just holds the validated values; `broker-server`
//! owns parsing a config file or CLI flags into one of these).

use broker_auth::AuthMode;
use std::net::IpAddr;
use std::time::Duration;

/// `ACCEPT_MIN_SLEEP`/`ACCEPT_MAX_SLEEP` from spec.md §4.4.
pub const ACCEPT_MIN_SLEEP: Duration = Duration::from_millis(10);
pub const ACCEPT_MAX_SLEEP: Duration = Duration::from_secs(1);

/// Suggested default from spec.md §6.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;
pub const DEFAULT_MAX_CONTROL_LINE: usize = 4096;

pub const MIN_BUF_SIZE: usize = 128;
pub const MAX_BUF_SIZE: usize = 65536;
pub const INITIAL_BUF_SIZE: usize = 512;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: IpAddr,
    pub port: u16,
    /// 0 means unbounded, per spec.md §4.4.
    pub max_conn: usize,
    pub max_payload: usize,
    pub max_control_line: usize,
    pub ping_interval: Duration,
    pub max_pings_out: u32,
    pub write_deadline: Duration,
    pub auth_timeout: Duration,
    pub auth: AuthMode,
    /// Capacity of each connection's outbound channel; this crate's stand-in
    /// for the Go source's write-buffer-plus-pending-flush-set (see
    /// DESIGN.md) — a full channel is this server's slow-consumer signal.
    pub write_channel_capacity: usize,
}

impl Default for ServerOptions {
    fn default() -> ServerOptions {
        ServerOptions {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 4222,
            max_conn: 0,
            max_payload: DEFAULT_MAX_PAYLOAD,
            max_control_line: DEFAULT_MAX_CONTROL_LINE,
            ping_interval: Duration::from_secs(120),
            max_pings_out: 2,
            write_deadline: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(1),
            auth: AuthMode::Open,
            write_channel_capacity: 256,
        }
    }
}
