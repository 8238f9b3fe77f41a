//! Domain types for the padlink host.
//!
//! Plain data with validation rules and no I/O: persisted settings, the
//! validated `update-config` patch, and the resolved runtime configuration.

pub mod config;

pub use config::{
    ConfigError, ConfigPatch, ConfigUpdateError, ServerConfig, ServerSettings, SwipeBindings,
};
