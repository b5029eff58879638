//! Configuration module for delve.
//!
//! Handles the config file, environment variable expansion, and the
//! conversion from file settings into per-stage engine configs.

mod settings;

pub use settings::{
    expand_env_vars, ConnectionSettings, DiscoverySettings, ExecutionSettings,
    LanguageModelSettings, Settings, SettingsError, WorkerSettings,
};
