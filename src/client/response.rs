use serde::{Deserialize, Serialize};
use std::fmt;

/// Body returned by the `audio/transcriptions` endpoint.
///
/// Only `text` is guaranteed; `segments` and `usage` depend on `response_format`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<ResponseSegment>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A speaker-attributed segment as returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSegment {
    /// String in `diarized_json` (`seg_0`), integer in `verbose_json`
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Token usage summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_token_details: Option<InputTokenDetails>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTokenDetails {
    #[serde(default)]
    pub audio_tokens: u64,
    #[serde(default)]
    pub text_tokens: u64,
}

impl Usage {
    pub fn audio_tokens(&self) -> u64 {
        self.input_token_details.map(|d| d.audio_tokens).unwrap_or(0)
    }

    pub fn text_tokens(&self) -> u64 {
        self.input_token_details.map(|d| d.text_tokens).unwrap_or(0)
    }

    /// Field-wise sum, used when aggregating chunks
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        let details = self.input_token_details.get_or_insert_with(Default::default);
        details.audio_tokens += other.audio_tokens();
        details.text_tokens += other.text_tokens();
    }
}

/// The `{"error": {"message", "type", "code"}}` triple the service returns on failure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

impl ApiError {
    /// Parse an error body, falling back to the raw text when it isn't the usual envelope.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<ApiErrorEnvelope>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => Self {
                message: body.trim().to_string(),
                error_type: None,
                code: None,
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.error_type, &self.code) {
            (Some(t), Some(c)) => write!(f, " ({}, {})", t, c),
            (Some(t), None) => write!(f, " ({})", t),
            (None, Some(c)) => write!(f, " ({})", c),
            (None, None) => Ok(()),
        }
    }
}
