// Integration tests for merging runs and rendering output
//
// These tests verify absolute timestamps, gap reporting, idempotence and
// the files written for each processed source.

mod common;

use anyhow::Result;
use chunked_transcribe::config::TranscriptionOptions;
use chunked_transcribe::{merge, output, Orchestrator, RunStatus, TranscriptionRun};
use common::{server_error, silent_source, test_settings, ScriptedBackend};
use tempfile::TempDir;

async fn run_with(backend: ScriptedBackend, duration_secs: f64) -> Result<TranscriptionRun> {
    let source = silent_source("depositions/Teresa Peters.mp3", duration_secs);
    let orchestrator = Orchestrator::new(backend, test_settings());
    Ok(orchestrator
        .run(&source, &TranscriptionOptions::default())
        .await?)
}

#[tokio::test(start_paused = true)]
async fn test_merge_shifts_segments_by_chunk_offset() -> Result<()> {
    let run = run_with(ScriptedBackend::new(), 900.0).await?;

    let merged = merge(&run);

    // Each chunk reports one segment at local 10.0s - 12.5s
    let starts: Vec<f64> = merged.segments.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![10.0, 310.0, 610.0]);
    assert_eq!(merged.segments[1].end, 312.5);
    assert_eq!(merged.segments[1].text, "chunk 2 text");

    // Verify: Chunk-local values in the run are untouched
    assert_eq!(run.result(2).map(|r| r.segments[0].start), Some(10.0));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_merge_joins_text_and_sums_usage() -> Result<()> {
    let run = run_with(ScriptedBackend::new(), 900.0).await?;

    let merged = merge(&run);

    assert_eq!(merged.text, "chunk 1 text chunk 2 text chunk 3 text");
    assert_eq!(merged.usage.total_tokens, 300);
    assert_eq!(merged.usage.audio_tokens(), 255);
    assert_eq!(merged.chunks_processed, 3);
    assert_eq!(merged.status, Some(RunStatus::Complete));
    assert!(merged.is_complete());
    assert!((merged.covered_seconds() - 900.0).abs() < 1e-9);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_merge_omits_failed_chunks_and_reports_gap() -> Result<()> {
    let backend = ScriptedBackend::new().always_fail(2, server_error());
    let run = run_with(backend, 750.0).await?;

    let merged = merge(&run);

    assert_eq!(merged.text, "chunk 1 text chunk 3 text");
    assert_eq!(merged.segments.len(), 2);
    assert_eq!(merged.segments[1].start, 610.0);

    assert_eq!(merged.gaps.len(), 1);
    assert_eq!(merged.gaps[0].chunk_index, 2);
    assert_eq!(merged.gaps[0].start_seconds, 300.0);
    assert_eq!(merged.gaps[0].end_seconds, 600.0);

    // Verify: Every chunk is listed with its outcome
    let attempts: Vec<u32> = merged.chunks.iter().map(|c| c.attempts).collect();
    assert_eq!(attempts, vec![1, 3, 1]);
    assert!((merged.covered_seconds() - 450.0).abs() < 1e-9);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_merge_is_idempotent() -> Result<()> {
    let backend = ScriptedBackend::new().always_fail(3, server_error());
    let run = run_with(backend, 1500.0).await?;

    let first = merge(&run);
    let second = merge(&run);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first)?,
        serde_json::to_string(&second)?
    );
    assert_eq!(run.results().len(), 5);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_render_text_marks_gaps_in_place() -> Result<()> {
    let backend = ScriptedBackend::new().always_fail(3, server_error());
    let run = run_with(backend, 1500.0).await?;

    let text = output::render_text(&merge(&run));

    assert!(text.contains("TRANSCRIPT: Teresa_Peters"));
    assert!(text.contains("[05:10] Speaker A: chunk 2 text"));
    assert!(text.contains("[GAP chunk 3: 10:00 - 15:00]"));
    assert!(text.contains("Coverage: INCOMPLETE, 1 gap(s)"));

    // Verify: Gap sits between chunk 2 and chunk 4 lines
    let gap_at = text.find("[GAP chunk 3").unwrap();
    assert!(text.find("chunk 2 text").unwrap() < gap_at);
    assert!(text.find("chunk 4 text").unwrap() > gap_at);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_write_json_and_text_outputs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = ScriptedBackend::new().always_fail(1, server_error());
    let run = run_with(backend, 600.0).await?;
    let merged = merge(&run);

    let json_path = output::write_json(temp_dir.path(), &merged, "gpt-4o-transcribe-diarize")?;
    let text_path = output::write_text(temp_dir.path(), &merged)?;

    let json_name = json_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    assert!(json_name.starts_with("Teresa_Peters_"), "{}", json_name);
    assert!(json_name.ends_with(".json"));
    assert_eq!(json_path.with_extension("txt"), text_path);
    assert!(text_path.exists());

    let document: serde_json::Value = serde_json::from_slice(&std::fs::read(&json_path)?)?;
    assert_eq!(document["metadata"]["status"], "partial");
    assert_eq!(document["metadata"]["model"], "gpt-4o-transcribe-diarize");
    assert_eq!(document["metadata"]["chunks_total"], 2);
    assert_eq!(document["gaps"][0]["chunk_index"], 1);
    assert_eq!(document["transcription"]["segments"][0]["start"], 310.0);
    assert_eq!(document["transcription"]["segments"][0]["speaker_label"], "A");
    assert_eq!(document["chunks"][0]["status"], "failed");
    assert_eq!(document["usage"]["total_tokens"], 100);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_outputs_for_same_stem_do_not_overwrite() -> Result<()> {
    // Setup: Two sources named witness.wav in different folders
    let temp_dir = TempDir::new()?;
    let orchestrator = Orchestrator::new(ScriptedBackend::new(), test_settings());
    let options = TranscriptionOptions::default();

    let day1 = orchestrator
        .run(&silent_source("day1/witness.wav", 300.0), &options)
        .await?;
    let day2 = orchestrator
        .run(&silent_source("day2/witness.wav", 300.0), &options)
        .await?;

    let first = output::write_json(temp_dir.path(), &merge(&day1), "model")?;
    let second = output::write_json(temp_dir.path(), &merge(&day2), "model")?;

    // Verify: Both documents survive
    assert_ne!(first, second);
    let first_doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&first)?)?;
    assert_eq!(first_doc["metadata"]["audio_file"], "day1/witness.wav");
    let second_doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&second)?)?;
    assert_eq!(second_doc["metadata"]["audio_file"], "day2/witness.wav");

    Ok(())
}
