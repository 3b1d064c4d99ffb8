//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file from the
//! platform-appropriate directory, falls back to defaults on first run, and
//! writes a default file on request.

pub mod config;
