//! Engine error taxonomy.
//!
//! Setup failures are fatal and surfaced once; teardown failures are logged
//! and never re-raised.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the recording engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The user denied or aborted a capture request. Not retried here.
    #[error("capture permission denied: {0}")]
    Permission(String),

    /// A display capture was granted without a system audio track.
    #[error("display capture has no audio track")]
    MissingAudioTrack,

    /// A capture or encoding facility is unavailable in this environment.
    #[error("capture facility unavailable: {0}")]
    Unsupported(String),

    /// Finalization produced a zero-byte artifact.
    #[error("encoding produced an empty artifact")]
    Encoding,

    /// A teardown step failed. Logged, never escalated.
    #[error("resource release failed: {0}")]
    Resource(String),

    /// An operation was requested in a phase that does not allow it.
    #[error("invalid session state: {0}")]
    InvalidState(String),
}

/// Discriminant of [`EngineError`], used in event reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Permission,
    MissingAudioTrack,
    Unsupported,
    Encoding,
    Resource,
    InvalidState,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Permission(_) => ErrorKind::Permission,
            Self::MissingAudioTrack => ErrorKind::MissingAudioTrack,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Encoding => ErrorKind::Encoding,
            Self::Resource(_) => ErrorKind::Resource,
            Self::InvalidState(_) => ErrorKind::InvalidState,
        }
    }
}
