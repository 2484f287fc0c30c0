use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

use super::file::AudioFile;
use crate::error::ChunkError;

/// Longest audio the diarization model accepts in a single request (25 minutes)
pub const MAX_CHUNK_DURATION_SECS: f64 = 1500.0;

/// Largest upload the transcription endpoint accepts (25 MiB)
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// WAV header written by hound for 16-bit PCM
const WAV_HEADER_BYTES: usize = 44;

/// Default chunk length (5 minutes)
pub const DEFAULT_CHUNK_DURATION_SECS: f64 = 300.0;

/// A fixed-duration slice of the source, ready for upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    /// Chunk number (1-indexed)
    pub index: usize,
    /// Offset of the first sample from the start of the source
    pub start_offset_seconds: f64,
    pub duration_seconds: f64,
    /// Upload file name, e.g. `deposition_chunk_03.wav`
    pub file_name: String,
    /// Self-contained 16-bit PCM WAV
    #[serde(skip)]
    pub payload: Bytes,
}

impl AudioChunk {
    pub fn end_offset_seconds(&self) -> f64 {
        self.start_offset_seconds + self.duration_seconds
    }
}

/// Split `source` into contiguous chunks of at most `chunk_duration` seconds.
///
/// Boundaries fall on whole sample frames. The final chunk holds whatever is
/// left and may be shorter. An empty source yields no chunks. Chunks whose WAV
/// payload would exceed [`MAX_UPLOAD_BYTES`] are rejected before encoding;
/// downsample with [`AudioFile::to_mono_16khz`] first.
pub fn split(source: &AudioFile, chunk_duration: f64) -> Result<Vec<AudioChunk>, ChunkError> {
    if !(chunk_duration > 0.0 && chunk_duration <= MAX_CHUNK_DURATION_SECS) {
        return Err(ChunkError::InvalidDuration {
            requested: chunk_duration,
            max: MAX_CHUNK_DURATION_SECS,
        });
    }

    let total_frames = source.frames();
    if total_frames == 0 || source.sample_rate == 0 {
        return Ok(Vec::new());
    }

    let sample_rate = source.sample_rate as f64;
    let channels = source.channels as usize;
    // Never longer than requested; the epsilon absorbs float error such as 0.29 * 100
    let frames_per_chunk = ((chunk_duration * sample_rate + 1e-6).floor() as usize).max(1);
    let stem = source.stem();

    let frame_bytes = channels * 2;
    let largest = WAV_HEADER_BYTES + frames_per_chunk.min(total_frames) * frame_bytes;
    if largest > MAX_UPLOAD_BYTES {
        return Err(ChunkError::PayloadTooLarge {
            bytes: largest,
            max: MAX_UPLOAD_BYTES,
        });
    }

    let mut chunks = Vec::with_capacity(total_frames.div_ceil(frames_per_chunk));
    let mut start_frame = 0;

    while start_frame < total_frames {
        let end_frame = (start_frame + frames_per_chunk).min(total_frames);
        let index = chunks.len() + 1;
        let samples = &source.samples[start_frame * channels..end_frame * channels];

        let payload = encode_wav(samples, source.sample_rate, source.channels).map_err(|e| {
            ChunkError::Encode {
                index,
                reason: e.to_string(),
            }
        })?;

        chunks.push(AudioChunk {
            index,
            start_offset_seconds: start_frame as f64 / sample_rate,
            duration_seconds: (end_frame - start_frame) as f64 / sample_rate,
            file_name: format!("{}_chunk_{:02}.wav", stem, index),
            payload,
        });

        start_frame = end_frame;
    }

    info!(
        "Split {} ({:.1}s) into {} chunks of up to {}s",
        source.path,
        source.duration_seconds,
        chunks.len(),
        chunk_duration
    );

    Ok(chunks)
}

/// Encode interleaved samples as an in-memory WAV file
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Bytes, hound::Error> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(Bytes::from(cursor.into_inner()))
}

/// Write chunk payloads to `dir`, returning the paths written
pub fn write_chunks(chunks: &[AudioChunk], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).context("Failed to create chunk directory")?;

    chunks
        .iter()
        .map(|chunk| {
            let path = dir.join(&chunk.file_name);
            fs::write(&path, &chunk.payload)
                .with_context(|| format!("Failed to write chunk: {:?}", path))?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_payload_is_readable_wav() {
        let samples: Vec<i16> = (0..400).map(|i| i as i16).collect();
        let payload = encode_wav(&samples, 16000, 2).unwrap();

        let reader = hound::WavReader::new(Cursor::new(payload.to_vec())).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 16000);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_rejects_out_of_range_duration() {
        let source = AudioFile::from_samples("a.wav", 100, 1, vec![0; 100]);
        assert!(matches!(
            split(&source, 0.0),
            Err(ChunkError::InvalidDuration { .. })
        ));
        assert!(matches!(
            split(&source, 1500.5),
            Err(ChunkError::InvalidDuration { .. })
        ));
        assert!(split(&source, MAX_CHUNK_DURATION_SECS).is_ok());
    }
}
