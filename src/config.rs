use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub directory: CollaboratorSettings,
    pub media: MediaSettings,
    pub geocoder: CollaboratorSettings,
    pub scoring: CollaboratorSettings,
    pub delivery: CollaboratorSettings,
    #[serde(default)]
    pub intake: IntakeSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub redis_url: String,
}

/// Base URL of an external HTTP collaborator
#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub base_url: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_bucket() -> String {
    "photos".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeSettings {
    /// Quiet period the photo aggregator waits after each album part
    /// before finalizing the batch.
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
    /// Profile directory cache tuning for candidate card rendering.
    #[serde(default = "default_profile_cache_size")]
    pub profile_cache_size: u64,
    #[serde(default = "default_profile_cache_ttl_secs")]
    pub profile_cache_ttl_secs: u64,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            profile_cache_size: default_profile_cache_size(),
            profile_cache_ttl_secs: default_profile_cache_ttl_secs(),
        }
    }
}

fn default_quiet_period_ms() -> u64 { 2500 }
fn default_profile_cache_size() -> u64 { 1000 }
fn default_profile_cache_ttl_secs() -> u64 { 300 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with AMORA_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with AMORA_)
            // e.g., AMORA_SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("AMORA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("AMORA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply plain (unprefixed) environment overrides commonly set in
/// container deployments, e.g. REDIS_URL.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let redis_url = env::var("REDIS_URL")
        .or_else(|_| env::var("AMORA_STORE__REDIS_URL"))
        .ok();

    let delivery_url = env::var("DELIVERY_URL").ok();

    let mut builder = Config::builder().add_source(settings);

    if let Some(url) = redis_url {
        builder = builder.set_override("store.redis_url", url)?;
    }
    if let Some(url) = delivery_url {
        builder = builder.set_override("delivery.base_url", url)?;
    }

    builder.build()
}
