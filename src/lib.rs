pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;

pub use audio::{split, AudioChunk, AudioFile, MAX_CHUNK_DURATION_SECS, MAX_UPLOAD_BYTES};
pub use client::{HttpTranscriptionClient, TranscriptionBackend, TranscriptionResponse, Usage};
pub use config::{Config, Credential, OrchestratorConfig, TranscriptionOptions};
pub use error::{ChunkError, FailureKind, SubmitError};
pub use orchestrator::{
    merge, Backoff, CancellationFlag, ChunkResult, ChunkStatus, Gap, MergedTranscript,
    Orchestrator, RunStatus, Segment, TranscriptionRun,
};
