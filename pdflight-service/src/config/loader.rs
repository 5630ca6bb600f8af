//! Configuration loading from files and environment variables.

use config::{Config as ConfigBuilder, Environment, File};

use crate::error::{ServiceError, ServiceResult};

use super::Config;

const ENV_PREFIX: &str = "PDFLIGHT";

/// Load configuration from `config.{toml,yaml,json}` and `PDFLIGHT_*` env vars.
///
/// Top-level keys map to single-underscore variables (`PDFLIGHT_MAX_MB`),
/// nested keys use `__` (`PDFLIGHT_SERVER__PORT`).
pub fn load_config() -> ServiceResult<Config> {
    load_from_environment(environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_from_environment(env: Environment) -> ServiceResult<Config> {
    let config: Config = ConfigBuilder::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(env)
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })?;

    config.validate()?;
    Ok(config)
}
