use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MEILI_URL: &str = "http://localhost:7700";
const DEFAULT_MEILI_INDEX: &str = "documents";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SUMMARY_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_SERVER_PORT: u16 = 8000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// How often the Meilisearch index and embedder are provisioned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionMode {
    /// Re-provision before every index, search, and clear call.
    #[default]
    Always,
    /// Provision once per process and again after any failed Meilisearch call.
    Once,
}

impl FromStr for ProvisionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "once" => Ok(Self::Once),
            _ => Err(()),
        }
    }
}

/// Runtime configuration for the sitebrief service.
///
/// Loaded once at startup and handed to each component on construction; nothing reads the
/// environment after that point.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Meilisearch instance.
    pub meili_url: String,
    /// Uid of the index holding summarized documents.
    pub meili_index: String,
    /// Optional key sent as a bearer token to Meilisearch.
    pub meili_api_key: Option<String>,
    /// Provisioning policy for the index and embedder.
    pub provision_mode: ProvisionMode,
    /// Block index requests until the document addition task settles.
    pub wait_for_tasks: bool,
    /// OpenAI key used for chat completions and by the Meilisearch embedder.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Chat model used for marketing summaries.
    pub summary_model: String,
    /// Sampling temperature for summaries.
    pub summary_temperature: f32,
    /// Upper bound on completion tokens for summaries.
    pub summary_max_tokens: u32,
    /// Embedding model configured on the Meilisearch embedder.
    pub embedding_model: String,
    /// Timeout applied to each page fetch.
    pub crawl_timeout_secs: u64,
    /// Timeout applied to each completion request.
    pub llm_timeout_secs: u64,
    /// Timeout applied to each Meilisearch call.
    pub meili_timeout_secs: u64,
    /// Port the HTTP server listens on.
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meili_url: DEFAULT_MEILI_URL.into(),
            meili_index: DEFAULT_MEILI_INDEX.into(),
            meili_api_key: None,
            provision_mode: ProvisionMode::Always,
            wait_for_tasks: false,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            summary_model: DEFAULT_SUMMARY_MODEL.into(),
            summary_temperature: 0.4,
            summary_max_tokens: 600,
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            crawl_timeout_secs: 60,
            llm_timeout_secs: 120,
            meili_timeout_secs: 30,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            meili_url: load_env_optional("MEILI_URL").unwrap_or(defaults.meili_url),
            meili_index: load_env_optional("MEILI_INDEX").unwrap_or(defaults.meili_index),
            meili_api_key: load_env_optional("MEILI_API_KEY"),
            provision_mode: load_env_optional("MEILI_PROVISION")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("MEILI_PROVISION".into()))
                })
                .transpose()?
                .unwrap_or(defaults.provision_mode),
            wait_for_tasks: load_parsed("MEILI_WAIT_FOR_TASKS")?.unwrap_or(defaults.wait_for_tasks),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or(defaults.openai_base_url),
            summary_model: load_env_optional("SUMMARY_MODEL").unwrap_or(defaults.summary_model),
            summary_temperature: load_parsed("SUMMARY_TEMPERATURE")?
                .unwrap_or(defaults.summary_temperature),
            summary_max_tokens: load_parsed("SUMMARY_MAX_TOKENS")?
                .unwrap_or(defaults.summary_max_tokens),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            crawl_timeout_secs: load_parsed("CRAWL_TIMEOUT_SECS")?
                .unwrap_or(defaults.crawl_timeout_secs),
            llm_timeout_secs: load_parsed("LLM_TIMEOUT_SECS")?
                .unwrap_or(defaults.llm_timeout_secs),
            meili_timeout_secs: load_parsed("MEILI_TIMEOUT_SECS")?
                .unwrap_or(defaults.meili_timeout_secs),
            server_port: load_parsed("SERVER_PORT")?.unwrap_or(defaults.server_port),
        })
    }

    /// Return the OpenAI key or the per-request error raised when it is absent.
    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("OPENAI_API_KEY".into()))
    }

    /// Timeout for a single page fetch.
    pub fn crawl_timeout(&self) -> Duration {
        Duration::from_secs(self.crawl_timeout_secs)
    }

    /// Timeout for a single completion request.
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Timeout for a single Meilisearch call.
    pub fn meili_timeout(&self) -> Duration {
        Duration::from_secs(self.meili_timeout_secs)
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
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
        meili_url = %config.meili_url,
        index = %config.meili_index,
        provision_mode = ?config.provision_mode,
        summary_model = %config.summary_model,
        embedding_model = %config.embedding_model,
        has_openai_key = config.openai_api_key.is_some(),
        server_port = config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
