use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_SETTINGS_PATH: &str = "config/docqna.json";
const DEFAULT_TOKENIZER_MODEL: &str = "gpt-3.5-turbo";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Process-level configuration for the docqna server.
///
/// Tunables that users edit at runtime (agent prompts, chunk threshold) live in the persisted
/// settings store instead; see [`crate::settings`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Location of the persisted settings store.
    pub settings_path: PathBuf,
    /// Model or encoding name used for token counting.
    pub tokenizer_model: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Credential overrides applied on top of the stored Azure settings.
    pub azure_overrides: AzureOverrides,
}

/// Azure OpenAI values taken from the environment instead of the settings store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureOverrides {
    /// `AZURE_OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// `AZURE_OPENAI_ENDPOINT`.
    pub azure_endpoint: Option<String>,
    /// `AZURE_OPENAI_API_VERSION`.
    pub api_version: Option<String>,
    /// `AZURE_OPENAI_DEPLOYMENT`.
    pub deployment_name: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            settings_path: load_env_optional("DOCQNA_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
            tokenizer_model: load_env_optional("TOKENIZER_MODEL")
                .unwrap_or_else(|| DEFAULT_TOKENIZER_MODEL.to_string()),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            azure_overrides: AzureOverrides {
                api_key: load_env_optional("AZURE_OPENAI_API_KEY"),
                azure_endpoint: load_env_optional("AZURE_OPENAI_ENDPOINT"),
                api_version: load_env_optional("AZURE_OPENAI_API_VERSION"),
                deployment_name: load_env_optional("AZURE_OPENAI_DEPLOYMENT"),
            },
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        settings_path = %config.settings_path.display(),
        tokenizer_model = %config.tokenizer_model,
        server_port = ?config.server_port,
        azure_key_from_env = config.azure_overrides.api_key.is_some(),
        "Loaded configuration"
    );
    // Integration tests may initialize more than once in the same process.
    let _ = CONFIG.set(config);
}
