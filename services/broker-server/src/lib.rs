//! CLI option parsing and config-file loading for the broker binary.

pub mod cli;
pub mod config;
