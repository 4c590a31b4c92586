use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use wbs_core::models::EngineConfig;

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding projects and tasks
    pub database_path: String,
    /// Default tracing filter; `RUST_LOG` takes precedence
    pub log_level: String,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "wbs.db".to_string(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// `wbs.toml` in the working directory, overridden by `WBS_*` variables.
    /// Nested keys use a double underscore: `WBS_ENGINE__REVERT_POLICY=clear`.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("wbs.toml"))
            .merge(Env::prefixed("WBS_").split("__"))
    }
}
