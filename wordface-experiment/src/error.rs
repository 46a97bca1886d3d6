use std::io;
use std::path::PathBuf;
use wordface_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("trial log {path}: {source}")]
    LogIo { path: PathBuf, source: io::Error },

    #[error("no session log is open")]
    NoSession,

    #[error("trial log: {0}")]
    Csv(#[from] csv::Error),

    #[error("trigger port {path}: {source}")]
    Port { path: PathBuf, source: io::Error },
}
