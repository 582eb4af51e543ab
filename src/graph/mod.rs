pub mod audio_graph;
pub mod context;
pub mod mixer;

pub use audio_graph::{AnalyserTap, AudioGraph, GraphOutputs, MixedStream};
pub use context::{ContextState, MixContext};
