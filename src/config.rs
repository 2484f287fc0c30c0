use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::MAX_CHUNK_DURATION_SECS;

/// Response formats that return a JSON body; `text`, `srt` and `vtt` do not
pub const JSON_RESPONSE_FORMATS: &[&str] = &["diarized_json", "verbose_json", "json"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub transcription: TranscriptionOptions,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Remote endpoint and credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Base URL, e.g. `https://my-resource.openai.azure.com/`
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Deployment name, also sent as the `model` form field
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// How the service is authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as the `api-key` header
    ApiKey(String),
    /// Sent as `Authorization: Bearer ...`
    Bearer(String),
}

/// Fixed per-request parameters sent with every chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    /// ISO-639-1 code; `None` lets the service auto-detect
    #[serde(default = "default_language")]
    pub language: Option<String>,
    #[serde(default = "default_response_format")]
    pub response_format: String,
    /// Passed through verbatim; the accepted shape is defined by the service
    #[serde(default = "default_chunking_strategy")]
    pub chunking_strategy: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub timestamp_granularities: Vec<String>,
}

/// Retry delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Linear,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_chunk_duration_secs")]
    pub chunk_duration_secs: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,
    /// Pause between consecutive chunk submissions to stay under rate limits
    #[serde(default = "default_inter_chunk_delay_secs")]
    pub inter_chunk_delay_secs: u64,
    /// Extra passes over failed chunks once a run finishes
    #[serde(default)]
    pub retry_passes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub write_text: bool,
    #[serde(default)]
    pub keep_chunks: bool,
}

fn default_api_version() -> String {
    "2025-04-01-preview".to_string()
}
fn default_deployment() -> String {
    "gpt-4o-transcribe-diarize".to_string()
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_language() -> Option<String> {
    Some("en".to_string())
}
fn default_response_format() -> String {
    "diarized_json".to_string()
}
fn default_chunking_strategy() -> String {
    "auto".to_string()
}
fn default_chunk_duration_secs() -> f64 {
    300.0
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    10
}
fn default_backoff() -> BackoffKind {
    BackoffKind::Fixed
}
fn default_inter_chunk_delay_secs() -> u64 {
    10
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output/transcripts")
}
fn default_true() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_version: default_api_version(),
            deployment: default_deployment(),
            api_key: None,
            bearer_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: default_language(),
            response_format: default_response_format(),
            chunking_strategy: default_chunking_strategy(),
            temperature: 0.0,
            timestamp_granularities: Vec::new(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: default_chunk_duration_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            backoff: default_backoff(),
            inter_chunk_delay_secs: default_inter_chunk_delay_secs(),
            retry_passes: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            write_text: true,
            keep_chunks: false,
        }
    }
}

impl ServiceConfig {
    /// API key wins over a bearer token when both are set.
    pub fn credential(&self) -> Option<Credential> {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        non_empty(&self.api_key)
            .map(Credential::ApiKey)
            .or_else(|| non_empty(&self.bearer_token).map(Credential::Bearer))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full transcription URL for the configured deployment
    pub fn transcription_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/audio/transcriptions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }

    /// Overlay the conventional Azure OpenAI environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("AZURE_OPENAI_API_VERSION") {
            self.api_version = v;
        }
        if let Some(v) = lookup("MODEL_DEPLOYMENT_NAME") {
            self.deployment = v;
        }
        if let Some(v) = lookup("AZURE_OPENAI_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("AZURE_OPENAI_AD_TOKEN") {
            self.bearer_token = Some(v);
        }
    }
}

impl TranscriptionOptions {
    /// Language to send, treating `auto` and blank as "let the service detect".
    pub fn language_code(&self) -> Option<&str> {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("auto"))
    }
}

impl OrchestratorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_secs(self.inter_chunk_delay_secs)
    }
}

impl Config {
    /// Load defaults, then the optional config file, then `TRANSCRIBE__*` and Azure env vars.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TRANSCRIBE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Failed to deserialize config")?;
        cfg.service.apply_env();

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.endpoint.trim().is_empty() {
            bail!("service.endpoint is not set (or AZURE_OPENAI_ENDPOINT)");
        }
        if self.service.credential().is_none() {
            bail!("No credential: set AZURE_OPENAI_API_KEY or AZURE_OPENAI_AD_TOKEN");
        }
        let chunk = self.orchestrator.chunk_duration_secs;
        if !(chunk > 0.0 && chunk <= MAX_CHUNK_DURATION_SECS) {
            bail!(
                "orchestrator.chunk_duration_secs must be in (0, {}], got {}",
                MAX_CHUNK_DURATION_SECS,
                chunk
            );
        }
        let format = self.transcription.response_format.as_str();
        if !JSON_RESPONSE_FORMATS.contains(&format) {
            bail!(
                "transcription.response_format must be one of {:?}, got {:?}",
                JSON_RESPONSE_FORMATS,
                format
            );
        }
        if self.orchestrator.max_attempts == 0 {
            bail!("orchestrator.max_attempts must be at least 1");
        }
        Ok(())
    }
}
