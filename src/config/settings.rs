//! TOML-based configuration for delve.
//!
//! Supports a config file (delve.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connection]
//! driver = "mssql"
//! connection_string = "${DELVE_DB_CONNECTION_STRING}"
//! default_schema = "dbo"
//!
//! [worker]
//! path = "/usr/local/bin/delve-worker"
//! timeout_secs = 30
//!
//! [discovery]
//! max_tables = 10
//! sample_tables = 5
//!
//! [execution]
//! step_timeout_secs = 30
//! run_timeout_secs = 300
//!
//! [language_model]
//! enabled = true
//! model = "claude-sonnet-4-20250514"
//! api_key_env = "ANTHROPIC_API_KEY"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery::DiscoveryConfig;
use crate::executor::ExecutorConfig;
use crate::planner::CompilerConfig;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub worker: WorkerSettings,
    pub discovery: DiscoverySettings,
    pub execution: ExecutionSettings,
    pub language_model: LanguageModelSettings,
}

/// Database connection handed to the worker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Worker driver name.
    pub driver: String,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,

    /// Schema assumed for unqualified table names.
    pub default_schema: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            driver: "mssql".to_string(),
            connection_string: String::new(),
            default_schema: "dbo".to_string(),
        }
    }
}

impl ConnectionSettings {
    /// Get the connection string with environment variables expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }
}

/// Database worker process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to the worker binary (searched for when unset).
    pub path: Option<String>,

    /// Extra command-line arguments.
    pub args: Vec<String>,

    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl WorkerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Schema discovery limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Cap on relevant tables kept after scoring.
    pub max_tables: usize,

    /// Candidates kept after table discovery, before structural analysis.
    pub search_limit: usize,

    /// How many top candidates get sampled.
    pub sample_tables: usize,

    /// Rows sampled per table.
    pub sample_rows: usize,

    /// Continue with an empty schema when listing schemas/tables fails.
    pub tolerate_reconnaissance_failure: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_tables: 10,
            search_limit: 10,
            sample_tables: 5,
            sample_rows: 5,
            tolerate_reconnaissance_failure: false,
        }
    }
}

/// Plan execution limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Deadline for any single external call.
    pub step_timeout_secs: u64,

    /// Deadline for a whole run.
    pub run_timeout_secs: u64,

    /// Rows of each step kept in the execution context.
    pub context_sample_rows: usize,

    /// Row limit for the answer query when the question names none.
    pub default_limit: i64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            step_timeout_secs: 30,
            run_timeout_secs: 300,
            context_sample_rows: 3,
            default_limit: 20,
        }
    }
}

impl ExecutionSettings {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs.max(1))
    }
}

/// Language model access.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LanguageModelSettings {
    /// When false, only the offline fallbacks are used.
    pub enabled: bool,

    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    pub max_tokens: u32,
}

impl Default for LanguageModelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 2048,
        }
    }
}

impl LanguageModelSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, SettingsError> {
        env::var(&self.api_key_env)
            .map_err(|_| SettingsError::MissingEnvVar(self.api_key_env.clone()))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DELVE_CONFIG`
    /// 2. `./delve.toml`
    /// 3. `~/.config/delve/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("DELVE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("delve.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("delve").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.discovery.max_tables == 0 {
            return Err(SettingsError::InvalidConfig(
                "discovery.max_tables must be at least 1".to_string(),
            ));
        }
        if self.connection.default_schema.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "connection.default_schema must not be empty".to_string(),
            ));
        }
        if self.execution.default_limit <= 0 {
            return Err(SettingsError::InvalidConfig(
                "execution.default_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            max_tables: self.discovery.max_tables,
            search_limit: self.discovery.search_limit.max(1),
            sample_tables: self.discovery.sample_tables,
            sample_rows: self.discovery.sample_rows,
            tolerate_reconnaissance_failure: self.discovery.tolerate_reconnaissance_failure,
            default_schema: self.connection.default_schema.clone(),
        }
    }

    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig {
            default_schema: self.connection.default_schema.clone(),
            default_limit: self.execution.default_limit,
            ..CompilerConfig::default()
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            default_schema: self.connection.default_schema.clone(),
            context_sample_rows: self.execution.context_sample_rows,
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&ch) = chars.peek() {
            if braced {
                chars.next();
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            } else if ch.is_alphanumeric() || ch == '_' {
                var_name.push(ch);
                chars.next();
            } else {
                break;
            }
        }

        if var_name.is_empty() && !braced {
            // A lone `$` is kept as-is.
            result.push('$');
            continue;
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
