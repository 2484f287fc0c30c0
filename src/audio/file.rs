use anyhow::{Context, Result};
use hound::WavReader;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

/// Sample rate chunks are uploaded at; enough for speech and keeps payloads small
pub const UPLOAD_SAMPLE_RATE: u32 = 16000;

/// Decoded source audio (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    /// Decode a file from disk.
    ///
    /// 16-bit PCM WAV is read directly with hound; everything else
    /// (MP3, M4A, FLAC, OGG, float WAV) goes through symphonia.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);

        let audio = if is_wav && is_pcm16_wav(path) {
            Self::open_wav(path)?
        } else {
            Self::open_with_symphonia(path)?
        };

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            audio.duration_seconds,
            audio.sample_rate,
            audio.channels,
            audio.samples.len()
        );

        Ok(audio)
    }

    /// Build a source from samples already in memory
    pub fn from_samples(
        path: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        samples: Vec<i16>,
    ) -> Self {
        let channels = channels.max(1);
        let duration_seconds = if sample_rate == 0 {
            0.0
        } else {
            (samples.len() / channels as usize) as f64 / sample_rate as f64
        };

        Self {
            path: path.into(),
            duration_seconds,
            sample_rate,
            channels,
            samples,
        }
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// File stem with spaces replaced, used to name chunks and outputs
    pub fn stem(&self) -> String {
        Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio")
            .replace(' ', "_")
    }

    /// Downmix to mono and downsample to [`UPLOAD_SAMPLE_RATE`].
    ///
    /// Each output sample is the mean of the source frames it covers. Sources
    /// already at or below 16 kHz keep their rate and are only downmixed.
    pub fn to_mono_16khz(&self) -> Self {
        let channels = self.channels as usize;
        let mono: Vec<i16> = if channels == 1 {
            self.samples.clone()
        } else {
            self.samples
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        if self.sample_rate <= UPLOAD_SAMPLE_RATE {
            return Self::from_samples(self.path.clone(), self.sample_rate, 1, mono);
        }

        let ratio = self.sample_rate as f64 / UPLOAD_SAMPLE_RATE as f64;
        let out_len = (mono.len() as f64 / ratio).floor() as usize;
        let resampled: Vec<i16> = (0..out_len)
            .map(|i| {
                let start = (i as f64 * ratio) as usize;
                let end = (((i + 1) as f64 * ratio) as usize).clamp(start + 1, mono.len());
                let window = &mono[start..end];
                let sum: i64 = window.iter().map(|&s| s as i64).sum();
                (sum / window.len() as i64) as i16
            })
            .collect();

        debug!(
            "Resampled {}: {}Hz {}ch -> {}Hz mono ({} -> {} samples)",
            self.path,
            self.sample_rate,
            self.channels,
            UPLOAD_SAMPLE_RATE,
            self.samples.len(),
            resampled.len()
        );

        Self::from_samples(self.path.clone(), UPLOAD_SAMPLE_RATE, 1, resampled)
    }

    fn open_wav(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        Ok(Self::from_samples(
            path.display().to_string(),
            spec.sample_rate,
            spec.channels,
            samples,
        ))
    }

    fn open_with_symphonia(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("Unsupported or unrecognized audio format")?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No decodable audio track")?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        let mut samples: Vec<i16> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;

                    let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(e).context("Failed to decode audio"),
            }
        }

        if sample_rate == 0 || channels == 0 {
            anyhow::bail!("Could not determine sample rate/channels for {}", path.display());
        }

        Ok(Self::from_samples(
            path.display().to_string(),
            sample_rate,
            channels,
            samples,
        ))
    }
}

fn is_pcm16_wav(path: &Path) -> bool {
    WavReader::open(path)
        .map(|r| {
            let spec = r.spec();
            spec.bits_per_sample == 16 && spec.sample_format == hound::SampleFormat::Int
        })
        .unwrap_or(false)
}
