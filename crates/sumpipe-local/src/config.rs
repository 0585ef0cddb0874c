//! Process-wide configuration, loaded once at startup.
//!
//! Everything here is read from the environment exactly once (`SumpipeConfig::from_env`) and then
//! passed by reference into the fetcher, the inference client, and the pipeline. Nothing in this
//! crate reads the environment at call time.

use std::time::Duration;
use sumpipe_core::{Error, Result, DEFAULT_MAX_CHUNK_CHARS, DEFAULT_MODEL_ID};

pub const DEFAULT_HF_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HF_TIMEOUT_MS: u64 = 120_000;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env(key) {
        None => Ok(default),
        Some(s) => s
            .parse::<T>()
            .map_err(|_| Error::InvalidConfig(format!("{key}: not a valid number: {s:?}"))),
    }
}

/// What to do when the source text cannot be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractFailurePolicy {
    /// Stop the run and report the extraction error.
    #[default]
    Abort,
    /// Treat the error message as the text and summarize it anyway.
    SummarizeAsText,
}

impl std::str::FromStr for ExtractFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "summarize" | "summarize-as-text" => Ok(Self::SummarizeAsText),
            other => Err(Error::InvalidConfig(format!(
                "unknown extract failure policy: {other:?} (expected abort|summarize)"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct SumpipeConfig {
    /// Bearer credential for the inference API (`HF_TOKEN`).
    pub hf_token: Option<String>,
    pub hf_base_url: String,
    pub hf_timeout: Duration,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub model_id: String,
    pub max_chunk_chars: usize,
    pub concurrency: usize,
}

impl std::fmt::Debug for SumpipeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SumpipeConfig")
            .field("hf_token", &self.hf_token.as_ref().map(|_| "<redacted>"))
            .field("hf_base_url", &self.hf_base_url)
            .field("hf_timeout", &self.hf_timeout)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("user_agent", &self.user_agent)
            .field("model_id", &self.model_id)
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Default for SumpipeConfig {
    fn default() -> Self {
        Self {
            hf_token: None,
            hf_base_url: DEFAULT_HF_BASE_URL.to_string(),
            hf_timeout: Duration::from_millis(DEFAULT_HF_TIMEOUT_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            concurrency: 1,
        }
    }
}

impl SumpipeConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let cfg = Self {
            hf_token: env("HF_TOKEN"),
            hf_base_url: env("SUMPIPE_HF_BASE_URL").unwrap_or(d.hf_base_url),
            hf_timeout: Duration::from_millis(env_parse(
                "SUMPIPE_HF_TIMEOUT_MS",
                DEFAULT_HF_TIMEOUT_MS,
            )?),
            fetch_timeout: Duration::from_millis(env_parse(
                "SUMPIPE_FETCH_TIMEOUT_MS",
                DEFAULT_FETCH_TIMEOUT_MS,
            )?),
            user_agent: env("SUMPIPE_USER_AGENT").unwrap_or(d.user_agent),
            model_id: env("SUMPIPE_MODEL").unwrap_or(d.model_id),
            max_chunk_chars: env_parse("SUMPIPE_MAX_CHUNK_CHARS", d.max_chunk_chars)?,
            concurrency: env_parse("SUMPIPE_CONCURRENCY", d.concurrency)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(Error::InvalidConfig(
                "max_chunk_chars must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.hf_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(Error::InvalidConfig("timeouts must be non-zero".to_string()));
        }
        url::Url::parse(&self.hf_base_url)
            .map_err(|e| Error::InvalidConfig(format!("hf_base_url: {e}")))?;
        Ok(())
    }

    pub fn has_token(&self) -> bool {
        self.hf_token.is_some()
    }
}
