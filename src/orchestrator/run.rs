use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::audio::AudioChunk;
use crate::client::{ResponseSegment, TranscriptionResponse, Usage};
use crate::error::{FailureKind, SubmitError};

/// A speaker-attributed span of text.
///
/// Speaker labels are only meaningful within the chunk that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub speaker_label: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl From<ResponseSegment> for Segment {
    fn from(seg: ResponseSegment) -> Self {
        Self {
            speaker_label: seg.speaker.unwrap_or_else(|| "Unknown".to_string()),
            text: seg.text,
            start: seg.start,
            end: seg.end,
        }
    }
}

impl Segment {
    /// Copy of this segment shifted by `offset` seconds
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Success,
    Failed,
}

/// Outcome of transcribing one chunk.
///
/// A retry produces a new `ChunkResult` that replaces the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk: AudioChunk,
    pub status: ChunkStatus,
    /// Chunk-local timestamps
    pub segments: Vec<Segment>,
    pub text: String,
    pub usage: Option<Usage>,
    /// Response body as received (error envelope on failure)
    pub raw_response: Option<Value>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// Remote calls made for this chunk
    pub attempts: u32,
    pub elapsed_seconds: f64,
}

impl ChunkResult {
    pub fn success(
        chunk: AudioChunk,
        response: TranscriptionResponse,
        raw: Value,
        elapsed_seconds: f64,
    ) -> Self {
        Self {
            chunk,
            status: ChunkStatus::Success,
            segments: response.segments.into_iter().map(Segment::from).collect(),
            text: response.text,
            usage: response.usage,
            raw_response: Some(raw),
            error: None,
            failure: None,
            attempts: 1,
            elapsed_seconds,
        }
    }

    pub fn failed(
        chunk: AudioChunk,
        error: &SubmitError,
        raw: Option<Value>,
        elapsed_seconds: f64,
    ) -> Self {
        Self {
            chunk,
            status: ChunkStatus::Failed,
            segments: Vec::new(),
            text: String::new(),
            usage: None,
            raw_response: raw,
            error: Some(error.to_string()),
            failure: Some(error.kind()),
            attempts: 1,
            elapsed_seconds,
        }
    }

    /// Placeholder for a chunk the caller cancelled before it was sent
    pub fn cancelled(chunk: AudioChunk) -> Self {
        Self {
            chunk,
            status: ChunkStatus::Failed,
            segments: Vec::new(),
            text: String::new(),
            usage: None,
            raw_response: None,
            error: Some("cancelled before submission".to_string()),
            failure: None,
            attempts: 0,
            elapsed_seconds: 0.0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ChunkStatus::Success
    }

    pub fn is_transient_failure(&self) -> bool {
        self.failure == Some(FailureKind::Transient)
    }
}

/// Coverage of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every chunk succeeded
    Complete,
    /// At least one chunk succeeded and at least one failed
    Partial,
    /// No chunk succeeded
    Failed,
}

impl RunStatus {
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if total > 0 && succeeded == total {
            RunStatus::Complete
        } else if succeeded > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}

/// All chunks of one source file and their results.
///
/// Results are keyed by chunk index. Once finished, there is exactly one
/// result per chunk and the run is no longer modified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRun {
    run_id: Uuid,
    source: String,
    chunks: Vec<AudioChunk>,
    results: BTreeMap<usize, ChunkResult>,
    overall_status: Option<RunStatus>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TranscriptionRun {
    pub(crate) fn new(source: impl Into<String>, chunks: Vec<AudioChunk>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.into(),
            chunks,
            results: BTreeMap::new(),
            overall_status: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Store (or replace) the result for its chunk
    pub(crate) fn record(&mut self, result: ChunkResult) {
        self.results.insert(result.chunk.index, result);
    }

    /// Compute the overall status; requires a result for every chunk.
    pub(crate) fn finish(&mut self) {
        debug_assert_eq!(self.results.len(), self.chunks.len());
        self.overall_status = Some(RunStatus::from_counts(
            self.succeeded_count(),
            self.chunks.len(),
        ));
        self.finished_at = Some(Utc::now());
    }

    /// Mark a finished run as in progress again before replacing results
    pub(crate) fn reopen(&mut self) {
        self.overall_status = None;
        self.finished_at = None;
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chunks(&self) -> &[AudioChunk] {
        &self.chunks
    }

    pub fn results(&self) -> &BTreeMap<usize, ChunkResult> {
        &self.results
    }

    pub fn result(&self, index: usize) -> Option<&ChunkResult> {
        self.results.get(&index)
    }

    /// `None` while chunks are still being processed
    pub fn overall_status(&self) -> Option<RunStatus> {
        self.overall_status
    }

    pub fn is_finished(&self) -> bool {
        self.overall_status.is_some()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.values().filter(|r| !r.is_success()).count()
    }

    /// Chunks whose latest result is a failure
    pub fn failed_chunks(&self) -> impl Iterator<Item = &AudioChunk> {
        self.results
            .values()
            .filter(|r| !r.is_success())
            .map(|r| &r.chunk)
    }
}
