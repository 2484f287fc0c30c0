use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::{ChunkStatus, RunStatus, Segment, TranscriptionRun};
use crate::client::Usage;

/// A stretch of the source with no transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub chunk_index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub error: Option<String>,
}

/// Per-chunk line in the merged output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// `None` if the chunk has no result yet
    pub status: Option<ChunkStatus>,
    pub attempts: u32,
    pub segments: usize,
    pub error: Option<String>,
}

/// One transcript for the whole source, with absolute timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedTranscript {
    pub run_id: Uuid,
    pub source: String,
    pub status: Option<RunStatus>,
    pub text: String,
    pub segments: Vec<Segment>,
    pub gaps: Vec<Gap>,
    pub chunks: Vec<ChunkSummary>,
    pub usage: Usage,
    pub chunks_processed: usize,
    pub processing_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MergedTranscript {
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Seconds of source audio that have a transcript
    pub fn covered_seconds(&self) -> f64 {
        self.chunks
            .iter()
            .filter(|c| c.status == Some(ChunkStatus::Success))
            .map(|c| c.end_seconds - c.start_seconds)
            .sum()
    }
}

/// Combine successful chunks in index order, shifting each segment by its chunk's offset.
///
/// Chunks that failed, or have no result yet, become gaps. Reads the run only.
pub fn merge(run: &TranscriptionRun) -> MergedTranscript {
    let mut texts = Vec::new();
    let mut segments = Vec::new();
    let mut gaps = Vec::new();
    let mut chunks = Vec::with_capacity(run.chunks().len());
    let mut usage = Usage::default();
    let mut processing_seconds = 0.0;

    for chunk in run.chunks() {
        let result = run.result(chunk.index);

        match result {
            Some(result) if result.status == ChunkStatus::Success => {
                let offset = chunk.start_offset_seconds;
                segments.extend(result.segments.iter().map(|s| s.shifted(offset)));

                let text = result.text.trim();
                if !text.is_empty() {
                    texts.push(text.to_string());
                }
                if let Some(chunk_usage) = &result.usage {
                    usage.add(chunk_usage);
                }
            }
            _ => gaps.push(Gap {
                chunk_index: chunk.index,
                start_seconds: chunk.start_offset_seconds,
                end_seconds: chunk.end_offset_seconds(),
                error: result
                    .and_then(|r| r.error.clone())
                    .or_else(|| Some("no result recorded".to_string())),
            }),
        }

        if let Some(result) = result {
            processing_seconds += result.elapsed_seconds;
        }

        chunks.push(ChunkSummary {
            index: chunk.index,
            start_seconds: chunk.start_offset_seconds,
            end_seconds: chunk.end_offset_seconds(),
            status: result.map(|r| r.status),
            attempts: result.map(|r| r.attempts).unwrap_or(0),
            segments: result.map(|r| r.segments.len()).unwrap_or(0),
            error: result.and_then(|r| r.error.clone()),
        });
    }

    MergedTranscript {
        run_id: run.run_id(),
        source: run.source().to_string(),
        status: run.overall_status(),
        text: texts.join(" "),
        segments,
        gaps,
        chunks,
        usage,
        chunks_processed: run.succeeded_count(),
        processing_seconds,
        started_at: run.started_at(),
        finished_at: run.finished_at(),
    }
}
