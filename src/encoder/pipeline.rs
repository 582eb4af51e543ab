//! Chunked encoder pipeline.
//!
//! A periodic task drains the mixed stream once per timeslice, encodes the
//! block, and appends the resulting chunk. Appending happens on this one
//! task, which is what guarantees contiguous, strictly increasing sequence
//! numbers. Finalization concatenates the stored chunk bytes into the
//! session artifact.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::graph::MixedStream;

use super::format::ChunkEncoder;

/// One slice of encoded audio. Immutable once emitted.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub sequence: u64,
    pub bytes: Vec<u8>,
    pub approx_timestamp_secs: f64,
}

/// The finished recording, handed to the caller at stop.
#[derive(Debug, Clone, Serialize)]
pub struct OutputArtifact {
    #[serde(skip_serializing)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size_bytes: usize,
}

/// Ordered chunk list with the append/discard rules applied.
pub(crate) struct ChunkStore {
    chunks: Vec<EncodedChunk>,
    next_sequence: u64,
}

impl ChunkStore {
    pub(crate) fn new() -> Self {
        Self {
            chunks: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Append a chunk in emission order. Zero-length payloads are
    /// discarded, not stored.
    pub(crate) fn append(&mut self, bytes: Vec<u8>, approx_timestamp_secs: f64) {
        if bytes.is_empty() {
            return;
        }
        self.chunks.push(EncodedChunk {
            sequence: self.next_sequence,
            bytes,
            approx_timestamp_secs,
        });
        self.next_sequence += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn chunks(&self) -> &[EncodedChunk] {
        &self.chunks
    }

    /// Concatenate every chunk, in sequence order, into the artifact.
    pub(crate) fn finalize(&self, mime_type: &str) -> Result<OutputArtifact, EngineError> {
        let size_bytes: usize = self.chunks.iter().map(|c| c.bytes.len()).sum();
        if size_bytes == 0 {
            return Err(EngineError::Encoding);
        }

        let mut bytes = Vec::with_capacity(size_bytes);
        for chunk in &self.chunks {
            bytes.extend_from_slice(&chunk.bytes);
        }
        Ok(OutputArtifact {
            bytes,
            mime_type: mime_type.to_string(),
            size_bytes,
        })
    }
}

pub struct EncoderPipeline {
    store: Arc<Mutex<ChunkStore>>,
    paused: Arc<AtomicBool>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    mime_type: String,
}

impl EncoderPipeline {
    /// Wrap the mixed stream and start emitting chunks every `timeslice`.
    pub fn spawn(
        mut mixed: MixedStream,
        mut encoder: Box<dyn ChunkEncoder>,
        timeslice: Duration,
    ) -> Self {
        let mime_type = encoder.mime_type().to_string();
        let store = Arc::new(Mutex::new(ChunkStore::new()));
        let paused = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        let task_store = store.clone();
        let task_paused = paused.clone();
        let task_token = token.clone();
        let timeslice_secs = timeslice.as_secs_f64();

        let task = tokio::spawn(async move {
            let mut tick = interval(timeslice);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut slices = 0u64;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tick.tick() => {
                        if task_paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        emit_slice(&mut mixed, encoder.as_mut(), &task_store, slices, timeslice_secs);
                        slices += 1;
                    }
                }
            }

            // Final drain so the tail of the session makes it into a chunk.
            emit_slice(&mut mixed, encoder.as_mut(), &task_store, slices, timeslice_secs);
            debug!("Encoder pipeline stopped");
        });

        Self {
            store,
            paused,
            token,
            task: Some(task),
            mime_type,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Suspend chunk emission. No chunk is appended while paused.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn chunk_count(&self) -> usize {
        self.store.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Snapshot of the emitted chunks, in sequence order.
    pub fn chunks(&self) -> Vec<EncodedChunk> {
        self.store
            .lock()
            .map(|s| s.chunks().to_vec())
            .unwrap_or_default()
    }

    /// Stop emission, drain the tail, and concatenate the artifact.
    pub async fn finalize(&mut self) -> Result<OutputArtifact, EngineError> {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    "{}",
                    EngineError::Resource(format!("encoder task failed: {e}"))
                );
            }
        }

        let store = self
            .store
            .lock()
            .map_err(|_| EngineError::Resource("chunk store poisoned".to_string()))?;
        store.finalize(&self.mime_type)
    }
}

fn emit_slice(
    mixed: &mut MixedStream,
    encoder: &mut dyn ChunkEncoder,
    store: &Arc<Mutex<ChunkStore>>,
    slice_index: u64,
    timeslice_secs: f64,
) {
    let mut samples = Vec::new();
    while let Ok(block) = mixed.try_recv() {
        samples.extend_from_slice(&block);
    }

    let bytes = encoder.encode_block(&samples);
    if bytes.is_empty() {
        return;
    }
    if let Ok(mut store) = store.lock() {
        store.append(bytes, slice_index as f64 * timeslice_secs);
    }
}
