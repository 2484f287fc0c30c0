//! Remote transcription client
//!
//! The orchestrator only depends on the narrow [`TranscriptionBackend`] trait:
//! one chunk in, raw response body (or a classified error) out. The HTTP
//! implementation talks to an Azure OpenAI `audio/transcriptions` deployment;
//! tests substitute fakes.

mod http;
mod response;

pub use http::HttpTranscriptionClient;
pub use response::{ApiError, InputTokenDetails, ResponseSegment, TranscriptionResponse, Usage};

use crate::audio::AudioChunk;
use crate::config::TranscriptionOptions;
use crate::error::SubmitError;

/// Something that can transcribe a single chunk.
///
/// Implementations issue exactly one remote call per invocation and never retry;
/// retry policy belongs to the orchestrator.
#[async_trait::async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Submit one chunk, returning the raw success body
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
        options: &TranscriptionOptions,
    ) -> Result<String, SubmitError>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
