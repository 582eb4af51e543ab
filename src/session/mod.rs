pub mod clock;
pub mod events;
pub mod machine;
pub mod status;
pub mod teardown;

pub use clock::SessionClock;
pub use events::{EngineEvent, EventSender};
pub use machine::{GraphSnapshot, RecordingMachine, StartOutcome};
pub use status::{SessionPhase, SessionState, SessionStatusHandle};
pub use teardown::Teardown;
