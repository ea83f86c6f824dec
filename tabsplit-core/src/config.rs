//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tabsplit/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tabsplit/` (~/.config/tabsplit/)
//! - Data: `$XDG_DATA_HOME/tabsplit/` (~/.local/share/tabsplit/)
//! - State/Logs: `$XDG_STATE_HOME/tabsplit/` (~/.local/state/tabsplit/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tabsplit";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve an XDG base directory: `$var` if set, else `~/<fallback>`
fn xdg_home(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(fallback))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// LLM used for receipt recognition and chat assignments (optional)
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// Model to use (must accept images for receipt scanning)
    pub model: String,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_timeout() -> u64 {
    60
}

/// Supported LLM providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Claude,
    OpenAI,
}

impl LlmProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAI => "https://api.openai.com",
        }
    }

    /// Environment variable consulted when no api_key is configured
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Ollama => None,
            LlmProvider::Claude => Some("ANTHROPIC_API_KEY"),
            LlmProvider::OpenAI => Some("OPENAI_API_KEY"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (e.g. "info", "tabsplit_core=debug")
    pub level: String,

    /// Daily log files kept before the oldest is removed
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            max_files: 5,
        }
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// The `[llm]` section, or an error naming the missing setting
    pub fn require_llm(&self) -> Result<&LlmConfig> {
        self.llm.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "an [llm] section is required in {}",
                Self::config_path().display()
            ))
        })
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tabsplit/config.toml` (~/.config/tabsplit/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_home("XDG_CONFIG_HOME", ".config").join(APP_DIR).join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/tabsplit/` (~/.local/share/tabsplit/)
    pub fn data_dir() -> PathBuf {
        xdg_home("XDG_DATA_HOME", ".local/share").join(APP_DIR)
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tabsplit/` (~/.local/state/tabsplit/)
    pub fn state_dir() -> PathBuf {
        xdg_home("XDG_STATE_HOME", ".local/state").join(APP_DIR)
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/tabsplit/bills.db` (~/.local/share/tabsplit/bills.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("bills.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/tabsplit/tabsplit.log` (~/.local/state/tabsplit/tabsplit.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tabsplit.log")
    }
}
