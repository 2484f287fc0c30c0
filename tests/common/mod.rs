// Shared test helpers: a scripted fake backend and in-memory sources.

#![allow(dead_code)]

use chunked_transcribe::client::{ApiError, TranscriptionBackend};
use chunked_transcribe::config::{OrchestratorConfig, TranscriptionOptions};
use chunked_transcribe::{AudioChunk, AudioFile, CancellationFlag, SubmitError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

/// Sample rate used for synthetic sources; low so long durations stay small
pub const TEST_SAMPLE_RATE: u32 = 100;

/// Backend that replays scripted outcomes per chunk index.
///
/// Once a chunk's script runs out it answers with `success_body(index)`,
/// unless the chunk was marked as always failing.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<usize, VecDeque<Result<String, SubmitError>>>>,
    always: HashMap<usize, SubmitError>,
    calls: Mutex<Vec<usize>>,
    call_times: Mutex<Vec<Instant>>,
    cancel_after: Option<(usize, CancellationFlag)>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, index: usize, outcomes: Vec<Result<String, SubmitError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(index, outcomes.into_iter().collect());
        self
    }

    pub fn always_fail(mut self, index: usize, error: SubmitError) -> Self {
        self.always.insert(index, error);
        self
    }

    /// Trip `flag` when chunk `index` is submitted
    pub fn cancel_after(mut self, index: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((index, flag));
        self
    }

    /// Chunk indexes in the order they were submitted
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    /// When each call arrived, on tokio's clock
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, index: usize) -> usize {
        self.calls().into_iter().filter(|&i| i == index).count()
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for ScriptedBackend {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
        _options: &TranscriptionOptions,
    ) -> Result<String, SubmitError> {
        self.calls.lock().unwrap().push(chunk.index);
        self.call_times.lock().unwrap().push(Instant::now());

        if let Some((index, flag)) = &self.cancel_after {
            if *index == chunk.index {
                flag.cancel();
            }
        }

        if let Some(error) = self.always.get(&chunk.index) {
            return Err(error.clone());
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&chunk.index)
            .and_then(|queue| queue.pop_front());

        scripted.unwrap_or_else(|| Ok(success_body(chunk.index)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Diarized response with one segment at local 10.0s - 12.5s
pub fn success_body(index: usize) -> String {
    serde_json::json!({
        "text": format!("chunk {} text", index),
        "segments": [
            {
                "id": "seg_1",
                "type": "transcript.text.segment",
                "speaker": "A",
                "text": format!("chunk {} text", index),
                "start": 10.0,
                "end": 12.5
            }
        ],
        "usage": {
            "type": "tokens",
            "input_tokens": 90,
            "output_tokens": 10,
            "total_tokens": 100,
            "input_token_details": {"audio_tokens": 85, "text_tokens": 5}
        }
    })
    .to_string()
}

pub fn server_error() -> SubmitError {
    SubmitError::Server {
        status: 500,
        error: ApiError {
            message: "The server had an error processing your request.".into(),
            error_type: Some("server_error".into()),
            code: None,
        },
    }
}

pub fn client_error() -> SubmitError {
    SubmitError::Request {
        status: 400,
        error: ApiError {
            message: "chunking_strategy is required for diarization models".into(),
            error_type: Some("invalid_request_error".into()),
            code: Some("invalid_value".into()),
        },
    }
}

/// Silent mono source of the given length
pub fn silent_source(name: &str, duration_secs: f64) -> AudioFile {
    let frames = (duration_secs * TEST_SAMPLE_RATE as f64).round() as usize;
    AudioFile::from_samples(name, TEST_SAMPLE_RATE, 1, vec![0i16; frames])
}

/// 300s chunks, 3 attempts, 10s retry delay, 10s pacing
pub fn test_settings() -> OrchestratorConfig {
    OrchestratorConfig {
        chunk_duration_secs: 300.0,
        max_attempts: 3,
        retry_delay_secs: 10,
        inter_chunk_delay_secs: 10,
        ..Default::default()
    }
}
