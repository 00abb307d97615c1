pub mod config;
pub mod error;
pub mod types;

pub use config::{load_config, FileConfig, Pacing, Secrets};
pub use error::{ConfigError, NewscredError};
pub use types::*;
