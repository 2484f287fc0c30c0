use anyhow::{Context, Result};
use chunked_transcribe::{
    audio::write_chunks, merge, output, AudioFile, Config, HttpTranscriptionClient, Orchestrator,
    RunStatus,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Transcribe long recordings with speaker diarization, one chunk at a time
#[derive(Parser, Debug)]
#[command(name = "chunked-transcribe", version)]
struct Args {
    /// Audio files to transcribe
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/chunked-transcribe")]
    config: String,

    /// Language code, or "auto" to let the service detect it
    #[arg(short, long)]
    language: Option<String>,

    /// Response format, e.g. diarized_json or json
    #[arg(long)]
    response_format: Option<String>,

    /// Chunk duration in seconds (max 1500)
    #[arg(long)]
    chunk_duration: Option<f64>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip the plain-text rendering
    #[arg(long)]
    no_text: bool,

    /// Also write chunk WAV files next to the output
    #[arg(long)]
    keep_chunks: bool,

    /// Re-submit failed chunks up to this many extra times after each run
    #[arg(long)]
    retry_passes: Option<u32>,
}

struct FileOutcome {
    source: String,
    status: Option<RunStatus>,
    gaps: usize,
    tokens: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;

    if let Some(language) = args.language {
        cfg.transcription.language = Some(language);
    }
    if let Some(format) = args.response_format {
        cfg.transcription.response_format = format;
    }
    if let Some(secs) = args.chunk_duration {
        cfg.orchestrator.chunk_duration_secs = secs;
    }
    if let Some(dir) = args.output_dir {
        cfg.output.dir = dir;
    }
    if args.no_text {
        cfg.output.write_text = false;
    }
    if args.keep_chunks {
        cfg.output.keep_chunks = true;
    }
    if let Some(passes) = args.retry_passes {
        cfg.orchestrator.retry_passes = passes;
    }
    cfg.validate()?;

    info!("chunked-transcribe v{}", env!("CARGO_PKG_VERSION"));
    info!("Deployment: {}", cfg.service.deployment);
    info!("Output directory: {}", cfg.output.dir.display());

    let client = HttpTranscriptionClient::new(&cfg.service)?;
    info!("Endpoint: {}", client.url());
    let orchestrator = Orchestrator::new(client, cfg.orchestrator.clone());

    let cancel = orchestrator.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing current chunk, skipping the rest");
            cancel.cancel();
        }
    });

    let mut outcomes = Vec::new();
    for (n, input) in args.inputs.iter().enumerate() {
        if orchestrator.cancellation().is_cancelled() {
            warn!("Cancelled; skipping {} remaining file(s)", args.inputs.len() - n);
            break;
        }
        info!("[{}/{}] Processing: {}", n + 1, args.inputs.len(), input.display());

        match process_file(&orchestrator, &cfg, input).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!("Error processing {}: {:#}", input.display(), e);
                outcomes.push(FileOutcome {
                    source: input.display().to_string(),
                    status: None,
                    gaps: 0,
                    tokens: 0,
                });
            }
        }
    }

    info!("Processing summary:");
    for outcome in &outcomes {
        match outcome.status {
            Some(status) => info!(
                "  {}: {:?}, {} gap(s), {} tokens",
                outcome.source, status, outcome.gaps, outcome.tokens
            ),
            None => info!("  {}: not processed", outcome.source),
        }
    }

    let any_transcript = outcomes
        .iter()
        .any(|o| matches!(o.status, Some(RunStatus::Complete | RunStatus::Partial)));
    if !any_transcript {
        anyhow::bail!("No input produced a transcript");
    }

    Ok(())
}

async fn process_file(
    orchestrator: &Orchestrator<HttpTranscriptionClient>,
    cfg: &Config,
    input: &Path,
) -> Result<FileOutcome> {
    let audio = AudioFile::open(input)?.to_mono_16khz();

    if cfg.output.keep_chunks {
        let chunks = orchestrator.split(&audio)?;
        let dir = cfg.output.dir.join("chunks");
        let written = write_chunks(&chunks, &dir)?;
        info!("Wrote {} chunk file(s) to {}", written.len(), dir.display());
    }

    let run = orchestrator
        .run(&audio, &cfg.transcription)
        .await
        .with_context(|| format!("Cannot transcribe {}", input.display()))?;
    let run = orchestrator
        .retry_failed_passes(run, &cfg.transcription, cfg.orchestrator.retry_passes)
        .await;

    let merged = merge(&run);
    output::write_json(&cfg.output.dir, &merged, &cfg.service.deployment)?;
    if cfg.output.write_text {
        output::write_text(&cfg.output.dir, &merged)?;
    }

    for gap in &merged.gaps {
        warn!(
            "Gap: chunk {} ({:.1}s - {:.1}s): {}",
            gap.chunk_index,
            gap.start_seconds,
            gap.end_seconds,
            gap.error.as_deref().unwrap_or("unknown")
        );
    }

    Ok(FileOutcome {
        source: input.display().to_string(),
        status: merged.status,
        gaps: merged.gaps.len(),
        tokens: merged.usage.total_tokens,
    })
}
