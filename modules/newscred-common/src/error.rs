use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewscredError {
    #[error("Item {article_id} panicked: {message}")]
    ItemPanicked { article_id: i64, message: String },
}

/// Startup configuration failures. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} environment variable is required")]
    MissingEnv(&'static str),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
