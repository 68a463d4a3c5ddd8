//! CLI configuration.
//!
//! Values are layered, later layers winning: built-in defaults, the TOML file
//! (`--config <path>` or `~/.config/toolbridge/config.toml`), the process
//! environment (after `.env` has been loaded), then command-line flags.
//!
//! ## Example Configuration
//!
//! ```toml
//! api_url = "http://localhost:8001"
//!
//! [llm]
//! provider = "gemini"
//! model = "gemini-2.0-flash"
//! api_key_env = "GEMINI_API_KEY"
//! temperature = 0.7
//! timeout_seconds = 60
//!
//! [settings]
//! max_tool_round_trips = 5
//! tool_timeout_seconds = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use toolbridge::{Config, DEFAULT_MAX_TOOL_ROUND_TRIPS, DEFAULT_SYSTEM_INSTRUCTION};

pub const DEFAULT_API_URL: &str = "http://localhost:8001";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Overrides the target API base URL.
pub const API_URL_ENV: &str = "TOOLBRIDGE_API_URL";
/// Overrides the model.
pub const MODEL_ENV: &str = "TOOLBRIDGE_MODEL";

/// Configuration as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Base URL of the target HTTP API.
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub settings: Settings,
}

/// LLM connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible endpoint; the client default is used when unset.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_seconds: None,
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Tool executions allowed per user turn (default: 5)
    #[serde(default = "default_max_tool_round_trips")]
    pub max_tool_round_trips: u32,

    #[serde(default)]
    pub system_instruction: Option<String>,

    /// Total timeout for one tool HTTP call (default: 30)
    #[serde(default = "default_tool_timeout_seconds")]
    pub tool_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_tool_round_trips: default_max_tool_round_trips(),
            system_instruction: None,
            tool_timeout_seconds: default_tool_timeout_seconds(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tool_round_trips() -> u32 {
    DEFAULT_MAX_TOOL_ROUND_TRIPS
}

const fn default_tool_timeout_seconds() -> u64 {
    30
}

/// Values taken from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub llm_base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tool_round_trips: Option<u32>,
}

/// Fully resolved settings the session starts from.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub api_url: String,
    pub llm: Config,
    pub system_instruction: String,
    pub max_tool_round_trips: u32,
    pub tool_timeout: Duration,
}

impl FileConfig {
    /// Loads the configuration file.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// tried and a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// explicit path does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Configuration file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The default configuration file path, if a config directory exists.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("toolbridge").join("config.toml"))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the model or key variable name is empty or a
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.llm.api_key_env.trim().is_empty() {
            bail!("llm.api_key_env must not be empty");
        }
        if self.llm.timeout_seconds == Some(0) {
            bail!("llm.timeout_seconds must be greater than zero");
        }
        if self.settings.tool_timeout_seconds == 0 {
            bail!("settings.tool_timeout_seconds must be greater than zero");
        }
        Ok(())
    }

    /// Applies the environment and flag layers.
    ///
    /// `env` looks up an environment variable by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is available or the resulting LLM
    /// configuration is invalid.
    pub fn resolve(
        self,
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Resolved> {
        let api_url = overrides
            .api_url
            .or_else(|| env(API_URL_ENV))
            .or(self.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let model = overrides
            .model
            .or_else(|| env(MODEL_ENV))
            .unwrap_or(self.llm.model);

        let api_key_env = self.llm.api_key_env;
        let api_key = overrides
            .api_key
            .or_else(|| env(api_key_env.as_str()))
            .filter(|key| !key.trim().is_empty())
            .with_context(|| {
                format!("API key must be provided via --api-key or the {api_key_env} env var")
            })?;

        let mut llm = Config::new(self.llm.provider, model)
            .with_api_key(api_key)
            .with_temperature(self.llm.temperature);
        if let Some(base_url) = overrides.llm_base_url.or(self.llm.base_url) {
            llm = llm.with_base_url(base_url);
        }
        if let Some(timeout) = self.llm.timeout_seconds {
            llm = llm.with_timeout(timeout);
        }
        llm.validate()?;

        Ok(Resolved {
            api_url,
            llm,
            system_instruction: self
                .settings
                .system_instruction
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            max_tool_round_trips: overrides
                .max_tool_round_trips
                .unwrap_or(self.settings.max_tool_round_trips),
            tool_timeout: Duration::from_secs(self.settings.tool_timeout_seconds),
        })
    }
}
