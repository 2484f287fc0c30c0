use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use super::TranscriptionBackend;
use crate::audio::AudioChunk;
use crate::config::{Credential, ServiceConfig, TranscriptionOptions};
use crate::error::SubmitError;

/// Azure OpenAI transcription deployment reached over HTTPS
pub struct HttpTranscriptionClient {
    client: reqwest::Client,
    url: String,
    model: String,
    credential: Credential,
}

impl HttpTranscriptionClient {
    pub fn new(service: &ServiceConfig) -> anyhow::Result<Self> {
        let credential = service
            .credential()
            .ok_or_else(|| anyhow::anyhow!("No API key or bearer token configured"))?;

        let client = reqwest::Client::builder()
            .timeout(service.request_timeout())
            .build()?;

        Ok(Self {
            client,
            url: service.transcription_url(),
            model: service.deployment.clone(),
            credential,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_form(
        &self,
        chunk: &AudioChunk,
        options: &TranscriptionOptions,
    ) -> Result<Form, SubmitError> {
        let part = Part::bytes(chunk.payload.to_vec())
            .file_name(chunk.file_name.clone())
            .mime_str("audio/wav")
            .map_err(|e| SubmitError::Transport(format!("Failed to create multipart: {}", e)))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", options.response_format.clone())
            .text("chunking_strategy", options.chunking_strategy.clone())
            .text("temperature", options.temperature.to_string());

        if let Some(language) = options.language_code() {
            form = form.text("language", language.to_string());
        }
        for granularity in &options.timestamp_granularities {
            form = form.text("timestamp_granularities[]", granularity.clone());
        }

        Ok(form)
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for HttpTranscriptionClient {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
        options: &TranscriptionOptions,
    ) -> Result<String, SubmitError> {
        let form = self.build_form(chunk, options)?;

        let request = self.client.post(&self.url).multipart(form);
        let request = match &self.credential {
            Credential::ApiKey(key) => request.header("api-key", key),
            Credential::Bearer(token) => request.bearer_auth(token),
        };

        debug!(
            "POST {} (chunk={}, bytes={})",
            self.url,
            chunk.index,
            chunk.payload.len()
        );

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SubmitError::Transport(format!("Request timed out: {}", e))
            } else {
                SubmitError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::Transport(format!("Failed to read response body: {}", e)))?;

        if status.is_success() {
            Ok(body)
        } else {
            let err = SubmitError::from_status(status.as_u16(), &body);
            warn!("Chunk {} rejected: {}", chunk.index, err);
            Err(err)
        }
    }

    fn name(&self) -> &str {
        "azure-openai"
    }
}
