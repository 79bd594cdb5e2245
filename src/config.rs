use std::path::PathBuf;

const DEFAULT_LOG_DIR: &str = "./logs";

/// Settings read from the environment (and `.env`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    /// Spans are exported over OTLP only when this is set
    pub otlp_endpoint: Option<String>,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Config {
            database_url: non_empty("DATABASE_URL"),
            otlp_endpoint: non_empty("OTLP_ENDPOINT"),
            log_dir: non_empty("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingVar("DATABASE_URL"))
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} isn't set")]
    MissingVar(&'static str),
}
