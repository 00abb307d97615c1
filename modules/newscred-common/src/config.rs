use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;
use crate::types::EntityType;

/// TOML-backed worker tunables loaded from disk once at startup.
/// Secrets (DB URL, API token) stay as env vars, see [`Secrets`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub inference: InferenceConfig,
    pub governor: GovernorConfig,
    pub translation: TranslationConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub base_url: String,
    /// Label written next to translations (`en_provider`).
    pub provider: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_bisect_depth: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.huggingface.co/hf-inference/models".to_string(),
            provider: "hf-inference".to_string(),
            timeout_secs: 60,
            max_retries: 3,
            max_bisect_depth: 12,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GovernorConfig {
    /// OS account whose processes count toward the load ceiling.
    pub account: String,
    pub cpu_ceiling_percent: f32,
    pub sample_window_ms: u64,
    /// Divide the summed utilization by the number of logical CPUs.
    pub normalize_per_core: bool,
    /// Deny admission when the sample cannot be taken.
    pub fail_closed: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            account: "www-data".to_string(),
            cpu_ceiling_percent: 40.0,
            sample_window_ms: 100,
            normalize_per_core: false,
            fail_closed: false,
        }
    }
}

impl GovernorConfig {
    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(self.sample_window_ms)
    }
}

/// Loop timing for one worker, resolved into durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub batch_size: i64,
    pub between_requests: Duration,
    pub between_batches: Duration,
    pub cooldown: Duration,
    pub idle: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationConfig {
    pub model: String,
    pub max_chars_per_chunk: usize,
    pub min_text_chars: usize,
    pub batch_size: i64,
    pub sleep_between_requests_ms: u64,
    pub sleep_between_batches_secs: u64,
    pub cooldown_secs: u64,
    pub idle_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            model: "Helsinki-NLP/opus-mt-hu-en".to_string(),
            max_chars_per_chunk: 400,
            min_text_chars: 1,
            batch_size: 100,
            sleep_between_requests_ms: 200,
            sleep_between_batches_secs: 5,
            cooldown_secs: 30,
            idle_secs: 60,
        }
    }
}

impl TranslationConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            batch_size: self.batch_size,
            between_requests: Duration::from_millis(self.sleep_between_requests_ms),
            between_batches: Duration::from_secs(self.sleep_between_batches_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            idle: Duration::from_secs(self.idle_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    pub nli_model: String,
    pub ner_model: String,
    pub sentiment_model: String,
    pub entity_types: Vec<EntityType>,
    pub nli_labels: Vec<String>,
    pub nli_target_labels: Vec<String>,
    /// Score sentiment only for claims naming a catalog company.
    pub company_sentiment: bool,
    pub min_text_chars: usize,
    pub min_claim_words: usize,
    pub max_claim_chars: usize,
    pub max_sentiment_chars: usize,
    pub max_chars_per_chunk: usize,
    pub batch_size: i64,
    pub sleep_between_requests_ms: u64,
    pub sleep_between_batches_secs: u64,
    pub cooldown_secs: u64,
    pub idle_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            nli_model: "MoritzLaurer/mDeBERTa-v3-base-mnli-xnli".to_string(),
            ner_model: "Davlan/bert-base-multilingual-cased-ner-hrl".to_string(),
            sentiment_model: "cardiffnlp/twitter-xlm-roberta-base-sentiment".to_string(),
            entity_types: EntityType::ALL.to_vec(),
            nli_labels: vec![
                "factual statement".to_string(),
                "opinion".to_string(),
                "speculation".to_string(),
            ],
            nli_target_labels: vec!["factual statement".to_string()],
            company_sentiment: true,
            min_text_chars: 150,
            min_claim_words: 5,
            max_claim_chars: 400,
            max_sentiment_chars: 512,
            max_chars_per_chunk: 400,
            batch_size: 50,
            sleep_between_requests_ms: 200,
            sleep_between_batches_secs: 10,
            cooldown_secs: 60,
            idle_secs: 120,
        }
    }
}

impl ExtractionConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            batch_size: self.batch_size,
            between_requests: Duration::from_millis(self.sleep_between_requests_ms),
            between_batches: Duration::from_secs(self.sleep_between_batches_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            idle: Duration::from_secs(self.idle_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Append-only JSON-lines sink in addition to stdout.
    pub log_file: Option<PathBuf>,
    /// Emit stdout lines as JSON too.
    pub json: bool,
    /// Fallback filter directive when RUST_LOG is unset.
    pub filter: Option<String>,
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: FileConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

impl FileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ceiling = self.governor.cpu_ceiling_percent;
        if !(ceiling > 0.0 && ceiling <= 100.0) {
            return Err(invalid(
                "governor.cpu_ceiling_percent",
                format!("{ceiling} is outside (0, 100]"),
            ));
        }
        if self.governor.account.trim().is_empty() {
            return Err(invalid("governor.account", "must not be empty"));
        }
        if self.inference.timeout_secs == 0 {
            return Err(invalid("inference.timeout_secs", "must be positive"));
        }
        if self.translation.model.trim().is_empty() {
            return Err(invalid("translation.model", "must not be empty"));
        }
        if self.translation.batch_size <= 0 {
            return Err(invalid("translation.batch_size", "must be positive"));
        }
        if self.translation.max_chars_per_chunk < 16 {
            return Err(invalid("translation.max_chars_per_chunk", "must be at least 16"));
        }
        if self.extraction.batch_size <= 0 {
            return Err(invalid("extraction.batch_size", "must be positive"));
        }
        if self.extraction.max_chars_per_chunk < 16 {
            return Err(invalid("extraction.max_chars_per_chunk", "must be at least 16"));
        }
        if self.extraction.nli_target_labels.is_empty() {
            return Err(invalid("extraction.nli_target_labels", "must not be empty"));
        }
        if let Some(label) = self
            .extraction
            .nli_target_labels
            .iter()
            .find(|l| !self.extraction.nli_labels.contains(l))
        {
            return Err(invalid(
                "extraction.nli_target_labels",
                format!("'{label}' is not one of nli_labels"),
            ));
        }
        Ok(())
    }

    /// Log the effective tunables. Secrets live in [`Secrets`] and never pass through here.
    pub fn log_redacted(&self) {
        info!(
            base_url = self.inference.base_url.as_str(),
            provider = self.inference.provider.as_str(),
            timeout_secs = self.inference.timeout_secs,
            max_retries = self.inference.max_retries,
            "Inference config"
        );
        info!(
            account = self.governor.account.as_str(),
            cpu_ceiling_percent = self.governor.cpu_ceiling_percent,
            sample_window_ms = self.governor.sample_window_ms,
            fail_closed = self.governor.fail_closed,
            "Governor config"
        );
        info!(
            model = self.translation.model.as_str(),
            batch_size = self.translation.batch_size,
            max_chars = self.translation.max_chars_per_chunk,
            "Translation config"
        );
        info!(
            nli = self.extraction.nli_model.as_str(),
            ner = self.extraction.ner_model.as_str(),
            sentiment = self.extraction.sentiment_model.as_str(),
            batch_size = self.extraction.batch_size,
            "Extraction config"
        );
    }
}

/// Secrets and environment-specific values, loaded from env (and `.env`).
#[derive(Clone)]
pub struct Secrets {
    pub database_url: String,
    pub hf_token: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("database_url", &"[redacted]")
            .field("hf_token", &"[redacted]")
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            hf_token: required_env("HF_TOKEN")?,
        })
    }

    /// The admin tool only touches the store.
    pub fn database_from_env() -> Result<String, ConfigError> {
        dotenvy::dotenv().ok();
        required_env("DATABASE_URL")
    }
}

fn required_env(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnv(key)),
    }
}
