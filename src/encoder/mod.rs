pub mod format;
pub mod pipeline;

pub use format::{negotiate, ChunkEncoder, PcmEncoder, WavStreamEncoder};
pub use pipeline::{EncodedChunk, EncoderPipeline, OutputArtifact};
