pub mod chunk;
pub mod file;

pub use chunk::{
    split, write_chunks, AudioChunk, DEFAULT_CHUNK_DURATION_SECS, MAX_CHUNK_DURATION_SECS,
    MAX_UPLOAD_BYTES,
};
pub use file::{AudioFile, UPLOAD_SAMPLE_RATE};
