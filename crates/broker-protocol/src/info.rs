//! Server `INFO` greeting and client `CONNECT` option documents.
//!
//! Both are plain JSON, decoded/encoded with `serde_json` the way
//! `rt-protocol` encodes its WebSocket envelopes.

use serde::{Deserialize, Serialize};

/// The greeting a server sends immediately after accepting a connection,
/// and again after the first `PONG` if options changed in between
/// (`infoUpdated`, see spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub server_id: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    pub auth_required: bool,
    pub ssl_required: bool,
    pub tls_required: bool,
    pub tls_verify: bool,
    pub max_payload: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connect_urls: Vec<String>,
}

impl ServerInfo {
    pub fn to_wire(&self) -> String {
        format!(
            "INFO {}\r\n",
            serde_json::to_string(self).expect("ServerInfo always serializes")
        )
    }
}

/// Protocol level a client advertises in `CONNECT.protocol`.
///
/// `0` is the legacy level; `1` ("ClientProtoInfo" in spec.md §4.3) means
/// the client understands an unsolicited `INFO` sent after the first
/// `PONG`.
pub const CLIENT_PROTO_INFO: i32 = 1;

/// Options carried in a client's `CONNECT` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectOpts {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub pedantic: bool,
    #[serde(default)]
    pub ssl_required: bool,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub protocol: i32,
}

impl ConnectOpts {
    pub fn from_json(raw: &[u8]) -> Result<ConnectOpts, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn supports_async_info(&self) -> bool {
        self.protocol >= CLIENT_PROTO_INFO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_opts_roundtrip() {
        let raw = br#"{"verbose":true,"user":"u","pass":"p","protocol":1}"#;
        let opts = ConnectOpts::from_json(raw).unwrap();
        assert!(opts.verbose);
        assert_eq!(opts.user.as_deref(), Some("u"));
        assert!(opts.supports_async_info());
    }

    #[test]
    fn connect_opts_defaults_when_sparse() {
        let opts = ConnectOpts::from_json(b"{}").unwrap();
        assert!(!opts.verbose);
        assert_eq!(opts.protocol, 0);
        assert!(!opts.supports_async_info());
    }

    #[test]
    fn server_info_wire_format() {
        let info = ServerInfo {
            server_id: "id1".into(),
            version: "0.1.0".into(),
            host: "0.0.0.0".into(),
            port: 4222,
            auth_required: false,
            ssl_required: false,
            tls_required: false,
            tls_verify: false,
            max_payload: 1048576,
            connect_urls: vec![],
        };
        let wire = info.to_wire();
        assert!(wire.starts_with("INFO {"));
        assert!(wire.ends_with("}\r\n"));
    }
}
