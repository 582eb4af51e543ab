//! Events emitted to the embedding layer.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::encoder::OutputArtifact;
use crate::error::ErrorKind;

use super::status::SessionPhase;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Fired on every phase transition and every clock tick.
    StateChanged {
        phase: SessionPhase,
        elapsed_seconds: u64,
    },
    /// Fired exactly once per session that reached Live, forced stops
    /// included. Never fired for a session that failed setup.
    Stopped { artifact: OutputArtifact },
    /// Fired once for a fatal failure. Terminal.
    Error { kind: ErrorKind, message: String },
}

/// Cloneable sender half of the event stream. The default sender is
/// disconnected and drops everything, which keeps headless embedders and
/// tests free of a mandatory receiver.
#[derive(Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn send(&self, event: EngineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
