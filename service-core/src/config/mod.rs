use crate::error::AppError;
use config::{Config as Cfg, File, FileFormat};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Settings shared by every service binary.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Loads `configuration.*` (optional) overlaid with `APP__*` environment variables.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Reads a YAML document from disk into `T`.
pub fn load_yaml_file<T: DeserializeOwned>(path: &str) -> Result<T, AppError> {
    let config = Cfg::builder()
        .add_source(File::new(path, FileFormat::Yaml))
        .build()?;
    Ok(config.try_deserialize()?)
}

/// Parses an in-memory YAML document into `T`.
pub fn parse_yaml_str<T: DeserializeOwned>(contents: &str) -> Result<T, AppError> {
    let config = Cfg::builder()
        .add_source(File::from_str(contents, FileFormat::Yaml))
        .build()?;
    Ok(config.try_deserialize()?)
}
