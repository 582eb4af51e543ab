pub mod constraints;
pub mod cpal_provider;
pub mod provider;
pub mod source;
pub mod synthetic;

pub use constraints::{AudioConstraints, CaptureConstraints, VideoConstraints};
pub use cpal_provider::CpalProvider;
pub use provider::{acquire_sources, AcquiredSources, CaptureProvider};
pub use source::{
    AudioTrack, CaptureSource, SourceKind, TrackTap, TrackWriter, VideoPreview, VideoTrack,
};
pub use synthetic::SyntheticProvider;
