//! Chunked transcription orchestration
//!
//! Drives a source file through splitting, submission, retry and merging:
//! - chunks are sent one at a time, with a pause between them
//! - transient failures (5xx, transport) are retried in place
//! - a chunk that still fails is recorded and the run moves on
//! - [`merge`] turns a run into one transcript with explicit gaps

mod merge;
mod retry;
mod run;

pub use merge::{merge, ChunkSummary, Gap, MergedTranscript};
pub use retry::{Backoff, RetryPolicy};
pub use run::{ChunkResult, ChunkStatus, RunStatus, Segment, TranscriptionRun};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::audio::{self, AudioChunk, AudioFile};
use crate::client::{TranscriptionBackend, TranscriptionResponse};
use crate::config::{OrchestratorConfig, TranscriptionOptions};
use crate::error::{ChunkError, SubmitError};

/// Caller-owned stop signal, checked before each chunk starts
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Orchestrator<B> {
    backend: B,
    settings: OrchestratorConfig,
    cancel: CancellationFlag,
    /// When the last chunk finished, across runs and retry passes
    last_chunk_done: Mutex<Option<tokio::time::Instant>>,
}

impl<B: TranscriptionBackend> Orchestrator<B> {
    pub fn new(backend: B, settings: OrchestratorConfig) -> Self {
        info!(
            "Orchestrator initialized: backend={}, chunks={}s, attempts={}, pacing={}s",
            backend.name(),
            settings.chunk_duration_secs,
            settings.max_attempts,
            settings.inter_chunk_delay_secs
        );

        Self {
            backend,
            settings,
            cancel: CancellationFlag::default(),
            last_chunk_done: Mutex::new(None),
        }
    }

    /// Share a stop signal created by the caller
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &OrchestratorConfig {
        &self.settings
    }

    /// Handle for stopping the run between chunks
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.settings)
    }

    /// Split using the configured chunk duration
    pub fn split(&self, source: &AudioFile) -> Result<Vec<AudioChunk>, ChunkError> {
        audio::split(source, self.settings.chunk_duration_secs)
    }

    /// One call to the backend. Every failure is folded into the result.
    pub async fn submit(&self, chunk: &AudioChunk, options: &TranscriptionOptions) -> ChunkResult {
        let started = Instant::now();
        let outcome = self.backend.transcribe(chunk, options).await;
        let elapsed = started.elapsed().as_secs_f64();

        let body = match outcome {
            Ok(body) => body,
            Err(err) => {
                let raw = match &err {
                    SubmitError::Server { error, .. } | SubmitError::Request { error, .. } => {
                        serde_json::to_value(error).ok()
                    }
                    _ => None,
                };
                return ChunkResult::failed(chunk.clone(), &err, raw, elapsed);
            }
        };

        let raw: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                let err = SubmitError::Malformed(e.to_string());
                return ChunkResult::failed(
                    chunk.clone(),
                    &err,
                    Some(serde_json::Value::String(body)),
                    elapsed,
                );
            }
        };

        match serde_json::from_value::<TranscriptionResponse>(raw.clone()) {
            Ok(response) => ChunkResult::success(chunk.clone(), response, raw, elapsed),
            Err(e) => {
                let err = SubmitError::Malformed(e.to_string());
                ChunkResult::failed(chunk.clone(), &err, Some(raw), elapsed)
            }
        }
    }

    /// Submit with a bounded number of attempts, retrying only transient failures.
    ///
    /// Returns the last result once attempts are used up. `max_attempts` of 0 means 1.
    pub async fn submit_with_retry(
        &self,
        chunk: &AudioChunk,
        options: &TranscriptionOptions,
        max_attempts: u32,
        backoff: Backoff,
    ) -> ChunkResult {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if attempt > 1 {
                info!(
                    "[Chunk {}] Retry attempt {}/{}",
                    chunk.index, attempt, max_attempts
                );
            }

            let mut result = self.submit(chunk, options).await;
            result.attempts = attempt;

            if result.is_success() {
                return result;
            }

            let error = result.error.as_deref().unwrap_or("unknown error");
            if !result.is_transient_failure() {
                error!("[Chunk {}] Fatal error, not retrying: {}", chunk.index, error);
                return result;
            }
            if attempt >= max_attempts {
                error!(
                    "[Chunk {}] Failed after {} attempts: {}",
                    chunk.index, attempt, error
                );
                return result;
            }

            let delay = backoff.delay_after(attempt);
            warn!(
                "[Chunk {}] Transient error (attempt {}/{}), waiting {:?} before retry: {}",
                chunk.index, attempt, max_attempts, delay, error
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Split `source` and transcribe every chunk in order.
    ///
    /// Only input problems (invalid chunk duration, empty audio) are errors;
    /// remote failures are reflected in the run's status.
    pub async fn run(
        &self,
        source: &AudioFile,
        options: &TranscriptionOptions,
    ) -> Result<TranscriptionRun, ChunkError> {
        let chunks = self.split(source)?;
        if chunks.is_empty() {
            return Err(ChunkError::EmptySource);
        }

        Ok(self.run_chunks(&source.path, chunks, options).await)
    }

    /// Transcribe pre-split chunks
    pub async fn run_chunks(
        &self,
        source: &str,
        chunks: Vec<AudioChunk>,
        options: &TranscriptionOptions,
    ) -> TranscriptionRun {
        let mut run = TranscriptionRun::new(source, chunks);
        let pending = run.chunks().to_vec();

        info!("Starting run {} for {} ({} chunks)", run.run_id(), source, pending.len());

        self.process(&mut run, &pending, options).await;
        run.finish();

        self.log_summary(&run);
        run
    }

    /// Re-submit the failed chunks of a finished run, replacing their results.
    pub async fn retry_failed(
        &self,
        mut run: TranscriptionRun,
        options: &TranscriptionOptions,
    ) -> TranscriptionRun {
        let failed: Vec<AudioChunk> = run.failed_chunks().cloned().collect();
        if failed.is_empty() {
            info!("Run {} has no failed chunks to retry", run.run_id());
            return run;
        }

        info!(
            "Retrying {} failed chunk(s) of run {}",
            failed.len(),
            run.run_id()
        );

        run.reopen();
        self.process(&mut run, &failed, options).await;
        run.finish();

        self.log_summary(&run);
        run
    }

    /// Up to `passes` rounds of [`retry_failed`](Self::retry_failed), stopping
    /// early once nothing is failed or the run is cancelled.
    pub async fn retry_failed_passes(
        &self,
        mut run: TranscriptionRun,
        options: &TranscriptionOptions,
        passes: u32,
    ) -> TranscriptionRun {
        for pass in 1..=passes {
            if run.failed_count() == 0 || self.cancel.is_cancelled() {
                break;
            }
            info!(
                "Retry pass {}/{} for run {}: {} failed chunk(s)",
                pass,
                passes,
                run.run_id(),
                run.failed_count()
            );
            run = self.retry_failed(run, options).await;
        }
        run
    }

    async fn process(
        &self,
        run: &mut TranscriptionRun,
        chunks: &[AudioChunk],
        options: &TranscriptionOptions,
    ) {
        let policy = self.retry_policy();
        let pacing = self.settings.inter_chunk_delay();
        let total = run.chunks().len();

        for chunk in chunks {
            // Checked again after pacing, which may have waited a while
            if !self.cancel.is_cancelled() {
                self.wait_for_pacing(pacing).await;
            }
            if self.cancel.is_cancelled() {
                warn!("[Chunk {}/{}] Skipped: run cancelled", chunk.index, total);
                run.record(ChunkResult::cancelled(chunk.clone()));
                continue;
            }

            info!(
                "[Chunk {}/{}] Starting transcription ({:.1}s - {:.1}s)",
                chunk.index,
                total,
                chunk.start_offset_seconds,
                chunk.end_offset_seconds()
            );

            let result = self
                .submit_with_retry(chunk, options, policy.max_attempts, policy.backoff)
                .await;

            if result.is_success() {
                info!(
                    "[Chunk {}/{}] Completed in {:.2}s ({} segments, {} tokens)",
                    chunk.index,
                    total,
                    result.elapsed_seconds,
                    result.segments.len(),
                    result.usage.map(|u| u.total_tokens).unwrap_or(0)
                );
            }
            run.record(result);
            self.mark_chunk_done();
        }
    }

    /// Hold the next submission until `pacing` has passed since the previous
    /// chunk finished, even if that chunk belonged to an earlier run.
    async fn wait_for_pacing(&self, pacing: Duration) {
        let last = *self
            .last_chunk_done
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        if let Some(done) = last {
            let ready_at = done + pacing;
            if ready_at > tokio::time::Instant::now() {
                info!("Waiting {:?} before next chunk", ready_at - tokio::time::Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    fn mark_chunk_done(&self) {
        *self
            .last_chunk_done
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(tokio::time::Instant::now());
    }

    fn log_summary(&self, run: &TranscriptionRun) {
        let status = run.overall_status();
        let succeeded = run.succeeded_count();
        let total = run.chunks().len();

        match status {
            Some(RunStatus::Complete) => {
                info!("Run {} complete: {}/{} chunks", run.run_id(), succeeded, total)
            }
            _ => warn!(
                "Run {} {:?}: {}/{} chunks succeeded, {} gap(s)",
                run.run_id(),
                status,
                succeeded,
                total,
                run.failed_count()
            ),
        }
    }
}
