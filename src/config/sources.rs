use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "CHAPTERBOX_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/chapterbox.toml";
const ENV_PREFIX: &str = "CHAPTERBOX";
const ENV_SEPARATOR: &str = "__";

/// Path of the TOML file: `CHAPTERBOX_CONFIG` or the default location
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration with priority (lowest first):
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if it exists)
/// 3. Variables from a `.env` file (via dotenvy)
/// 4. Process environment
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();
    load_from_sources(&config_path())
}

/// Load configuration from a specific file plus the environment
pub fn load_from_sources(config_path: &Path) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // CHAPTERBOX__SCHEDULER__WORKERS -> scheduler.workers
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
