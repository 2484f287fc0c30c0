use anyhow::{Context, Result};
use serde_json::json;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::orchestrator::{Gap, MergedTranscript, Segment};

const RULE: &str = "================================================================================";

/// Output file stem for a source path: file stem with spaces replaced
pub fn output_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transcript")
        .replace(' ', "_")
}

/// File name shared by a run's outputs: `<stem>_<YYYYMMDD_HHMMSS>_<run id prefix>`.
///
/// Sources with the same stem, and repeated runs of one source, never collide.
pub fn output_basename(merged: &MergedTranscript) -> String {
    let run_id = merged.run_id.simple().to_string();
    format!(
        "{}_{}_{}",
        output_stem(&merged.source),
        merged.started_at.format("%Y%m%d_%H%M%S"),
        &run_id[..8]
    )
}

/// Write `<basename>.json` with metadata, usage, transcript, gaps and per-chunk status
pub fn write_json(dir: &Path, merged: &MergedTranscript, model: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).context("Failed to create output directory")?;
    let path = dir.join(format!("{}.json", output_basename(merged)));

    let document = json!({
        "metadata": {
            "run_id": merged.run_id,
            "audio_file": merged.source,
            "model": model,
            "started_at": merged.started_at,
            "finished_at": merged.finished_at,
            "processing_seconds": merged.processing_seconds,
            "status": merged.status,
            "chunks_total": merged.chunks.len(),
            "chunks_processed": merged.chunks_processed,
            "covered_seconds": merged.covered_seconds(),
        },
        "usage": {
            "total_tokens": merged.usage.total_tokens,
            "input_tokens": merged.usage.input_tokens,
            "output_tokens": merged.usage.output_tokens,
            "audio_tokens": merged.usage.audio_tokens(),
            "text_tokens": merged.usage.text_tokens(),
        },
        "transcription": {
            "text": merged.text,
            "segments": merged.segments,
        },
        "gaps": merged.gaps,
        "chunks": merged.chunks,
    });

    let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, &document)?;

    info!("Saved JSON: {}", path.display());
    Ok(path)
}

/// Write `<basename>.txt` with the readable rendering
pub fn write_text(dir: &Path, merged: &MergedTranscript) -> Result<PathBuf> {
    fs::create_dir_all(dir).context("Failed to create output directory")?;
    let path = dir.join(format!("{}.txt", output_basename(merged)));

    fs::write(&path, render_text(merged)).with_context(|| format!("Failed to write {:?}", path))?;

    info!("Saved text: {}", path.display());
    Ok(path)
}

/// Readable transcript: one `[MM:SS] Speaker X: text` line per segment,
/// with gap markers where chunks are missing and a statistics footer.
pub fn render_text(merged: &MergedTranscript) -> String {
    let mut lines = vec![
        RULE.to_string(),
        format!("TRANSCRIPT: {}", output_stem(&merged.source)),
        RULE.to_string(),
        String::new(),
    ];
    let mut speakers = BTreeSet::new();

    // Segments are already ordered by chunk; interleave gaps by start time.
    let mut gaps = merged.gaps.iter().peekable();
    for segment in &merged.segments {
        while let Some(gap) = gaps.next_if(|g| g.start_seconds <= segment.start) {
            lines.push(gap_line(gap));
        }
        speakers.insert(segment.speaker_label.as_str());
        lines.push(segment_line(segment));
    }
    lines.extend(gaps.map(gap_line));

    lines.extend([
        String::new(),
        RULE.to_string(),
        "STATISTICS".to_string(),
        RULE.to_string(),
        format!(
            "Total Chunks: {} ({} transcribed)",
            merged.chunks.len(),
            merged.chunks_processed
        ),
        format!("Total Segments: {}", merged.segments.len()),
        format!("Total Tokens: {}", merged.usage.total_tokens),
        format!(
            "Speakers Identified: {} ({})",
            speakers.len(),
            speakers.into_iter().collect::<Vec<_>>().join(", ")
        ),
    ]);
    if let Some(last) = merged.segments.last() {
        lines.push(format!(
            "Duration: {} ({:.1}s)",
            format_timestamp(last.end),
            last.end
        ));
    }
    lines.push(if merged.gaps.is_empty() {
        "Coverage: complete".to_string()
    } else {
        format!(
            "Coverage: INCOMPLETE, {} gap(s), {:.1}s transcribed",
            merged.gaps.len(),
            merged.covered_seconds()
        )
    });
    lines.push(RULE.to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn segment_line(segment: &Segment) -> String {
    format!(
        "[{}] Speaker {}: {}",
        format_timestamp(segment.start),
        segment.speaker_label,
        segment.text.trim()
    )
}

fn gap_line(gap: &Gap) -> String {
    format!(
        "[GAP chunk {}: {} - {}] {}",
        gap.chunk_index,
        format_timestamp(gap.start_seconds),
        format_timestamp(gap.end_seconds),
        gap.error.as_deref().unwrap_or("not transcribed")
    )
}

/// `MM:SS`; minutes keep counting past the hour
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
