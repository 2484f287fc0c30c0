// Integration tests for configuration loading and validation

use anyhow::Result;
use chunked_transcribe::config::{BackoffKind, Config};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_load_from_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("transcribe.toml");
    fs::write(
        &path,
        r#"
[transcription]
language = "es"
response_format = "json"
timestamp_granularities = ["segment"]

[orchestrator]
chunk_duration_secs = 600
max_attempts = 10
retry_delay_secs = 60
backoff = "linear"
inter_chunk_delay_secs = 15
retry_passes = 2

[output]
dir = "out/depositions"
write_text = false
"#,
    )?;

    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.transcription.language.as_deref(), Some("es"));
    assert_eq!(cfg.transcription.response_format, "json");
    assert_eq!(cfg.transcription.timestamp_granularities, vec!["segment"]);
    assert_eq!(cfg.transcription.chunking_strategy, "auto", "Unset keys keep defaults");
    assert_eq!(cfg.orchestrator.chunk_duration_secs, 600.0);
    assert_eq!(cfg.orchestrator.max_attempts, 10);
    assert_eq!(cfg.orchestrator.backoff, BackoffKind::Linear);
    assert_eq!(cfg.orchestrator.inter_chunk_delay_secs, 15);
    assert_eq!(cfg.orchestrator.retry_passes, 2);
    assert_eq!(cfg.output.dir.to_str(), Some("out/depositions"));
    assert!(!cfg.output.write_text);

    Ok(())
}

#[test]
fn test_config_missing_file_uses_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("does-not-exist");

    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.orchestrator.chunk_duration_secs, 300.0);
    assert_eq!(cfg.orchestrator.max_attempts, 3);
    assert_eq!(cfg.orchestrator.backoff, BackoffKind::Fixed);
    assert_eq!(cfg.transcription.response_format, "diarized_json");

    Ok(())
}

fn valid_config() -> Config {
    let mut cfg = Config::default();
    cfg.service.endpoint = "https://example.openai.azure.com/".to_string();
    cfg.service.api_key = Some("key".to_string());
    cfg
}

#[test]
fn test_validate_accepts_complete_config() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn test_validate_rejects_chunks_over_service_limit() {
    let mut cfg = valid_config();
    cfg.orchestrator.chunk_duration_secs = 1800.0;

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("chunk_duration_secs"));

    cfg.orchestrator.chunk_duration_secs = 1500.0;
    assert!(cfg.validate().is_ok(), "The limit itself is allowed");
}

#[test]
fn test_validate_requires_endpoint_and_credential() {
    let mut cfg = valid_config();
    cfg.service.api_key = None;
    cfg.service.bearer_token = None;
    assert!(cfg.validate().is_err());

    let mut cfg = valid_config();
    cfg.service.endpoint = String::new();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_rejects_non_json_response_formats() {
    let mut cfg = valid_config();

    for format in ["text", "srt", "vtt"] {
        cfg.transcription.response_format = format.to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("response_format"), "{}", format);
    }

    for format in ["diarized_json", "verbose_json", "json"] {
        cfg.transcription.response_format = format.to_string();
        assert!(cfg.validate().is_ok(), "{} should be accepted", format);
    }
}
