//! Command-line surface for the broker binary.

use broker_core::ServerOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "broker-server", about = "A lightweight publish/subscribe message broker")]
pub struct Cli {
    /// Path to a TOML config file. Every setting has a default, so this is optional.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    #[arg(short = 'a', long = "addr")]
    pub addr: Option<String>,

    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Debug-level logging.
    #[arg(short = 'D', long = "debug")]
    pub debug: bool,

    /// Trace-level logging (implies `--debug`).
    #[arg(short = 'V', long = "trace")]
    pub trace: bool,

    /// Redirect log output to a file instead of stderr.
    #[arg(short = 'l', long = "log")]
    pub log_file: Option<PathBuf>,

    #[arg(short = 'P', long = "pid")]
    pub pid_file: Option<PathBuf>,

    /// Accepted for compatibility with clustered deployments; there is no
    /// inter-broker routing implemented, so this is currently a no-op.
    #[arg(long = "cluster")]
    pub cluster: Option<String>,

    #[arg(long = "routes", value_delimiter = ',')]
    pub routes: Vec<String>,
}

impl Cli {
    /// CLI flags override whatever a config file set.
    pub fn apply(&self, mut options: ServerOptions) -> ServerOptions {
        if let Some(addr) = &self.addr {
            match addr.parse() {
                Ok(ip) => options.host = ip,
                Err(err) => tracing::warn!(%addr, error = %err, "ignoring unparsable --addr"),
            }
        }
        if let Some(port) = self.port {
            options.port = port;
        }
        options
    }

    pub fn log_level(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
