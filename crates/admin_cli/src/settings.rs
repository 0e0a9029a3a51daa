//! Settings for the admin CLI, read from an optional `bottega.toml` in the
//! working directory and from `BOTTEGA__`-prefixed environment variables
//! (`BOTTEGA__DATABASE__URL`, `BOTTEGA__APP__LEVEL`, ...).
use config::{Config, ConfigError, Environment, File};
use engine::DatabaseOptions;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    /// Log level for the `engine` and `bottega_admin` targets.
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: DatabaseOptions,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("bottega").required(false))
            .add_source(Environment::with_prefix("BOTTEGA").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
