//! Confab: the recording engine of a meeting assistant.
//!
//! The engine acquires capture sources (microphone or display with system
//! audio), routes them through a fixed mixing graph, encodes the mix into
//! ordered chunks, and hands back one artifact when the session stops. A
//! visualizer feed and a pausable session clock run alongside; teardown
//! releases everything exactly once on every exit path.

pub mod capture;
pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod graph;
pub mod session;
pub mod visualizer;

pub use capture::{CaptureConstraints, CpalProvider, SourceKind, SyntheticProvider};
pub use config::Config;
pub use encoder::{EncodedChunk, OutputArtifact};
pub use error::{EngineError, ErrorKind};
pub use session::{
    EngineEvent, EventSender, RecordingMachine, SessionPhase, SessionStatusHandle, StartOutcome,
};
pub use visualizer::{NullSink, RenderSink, VisualFrame};
