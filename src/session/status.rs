//! Session phase types and the shared status handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::capture::SourceKind;

use super::events::{EngineEvent, EventSender};

/// Phase of a recording session lifecycle.
///
/// ```text
/// idle → acquiring → { error | live } ; live ⇄ paused ;
/// { live, paused } → stopping → stopped
/// ```
/// `error` and `stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Live,
    Paused,
    Stopping,
    Stopped,
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Live => "live",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

/// Current session state, readable by the embedding layer.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub session_id: Option<Uuid>,
    pub source_kind: Option<SourceKind>,
    pub elapsed_seconds: u64,
    pub muted: bool,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            session_id: None,
            source_kind: None,
            elapsed_seconds: 0,
            muted: false,
            last_error: None,
        }
    }
}

/// Thread-safe handle for sharing session state between the machine, the
/// clock, and the embedding layer. Every mutation emits a state-changed
/// event.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionState>>,
    events: EventSender,
}

impl SessionStatusHandle {
    pub fn new(events: EventSender) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState::default())),
            events,
        }
    }

    pub async fn get(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    /// Reset to a fresh session entering acquisition.
    pub async fn begin_acquiring(&self, session_id: Uuid, kind: SourceKind) {
        let mut state = self.inner.lock().await;
        *state = SessionState {
            phase: SessionPhase::Acquiring,
            session_id: Some(session_id),
            source_kind: Some(kind),
            ..SessionState::default()
        };
        self.emit(&state);
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.inner.lock().await;
        state.phase = phase;
        self.emit(&state);
    }

    pub async fn set_error(&self, message: String) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Error;
        state.last_error = Some(message);
        self.emit(&state);
    }

    pub async fn set_muted(&self, muted: bool) {
        let mut state = self.inner.lock().await;
        state.muted = muted;
    }

    /// Advance the elapsed clock by one unit and return the new value.
    pub async fn tick(&self) -> u64 {
        let mut state = self.inner.lock().await;
        state.elapsed_seconds += 1;
        self.emit(&state);
        state.elapsed_seconds
    }

    fn emit(&self, state: &SessionState) {
        self.events.send(EngineEvent::StateChanged {
            phase: state.phase,
            elapsed_seconds: state.elapsed_seconds,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::Acquiring.as_str(), "acquiring");
        assert_eq!(SessionPhase::Live.as_str(), "live");
        assert_eq!(SessionPhase::Paused.as_str(), "paused");
        assert_eq!(SessionPhase::Stopping.as_str(), "stopping");
        assert_eq!(SessionPhase::Stopped.as_str(), "stopped");
        assert_eq!(SessionPhase::Error.as_str(), "error");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(SessionPhase::Stopped.is_terminal());
        assert!(SessionPhase::Error.is_terminal());
        assert!(!SessionPhase::Paused.is_terminal());
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&SessionPhase::Live).unwrap();
        assert_eq!(json, "\"live\"");
        let parsed: SessionPhase = serde_json::from_str("\"stopping\"").unwrap();
        assert_eq!(parsed, SessionPhase::Stopping);
    }

    #[tokio::test]
    async fn test_begin_acquiring_resets_state() {
        let handle = SessionStatusHandle::default();
        handle.set_muted(true).await;
        handle.tick().await;

        let id = Uuid::new_v4();
        handle.begin_acquiring(id, SourceKind::Microphone).await;
        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Acquiring);
        assert_eq!(state.session_id, Some(id));
        assert_eq!(state.elapsed_seconds, 0);
        assert!(!state.muted);
    }

    #[tokio::test]
    async fn test_tick_advances_and_emits() {
        let (events, mut rx) = EventSender::channel();
        let handle = SessionStatusHandle::new(events);
        handle.set_phase(SessionPhase::Live).await;
        assert_eq!(handle.tick().await, 1);
        assert_eq!(handle.tick().await, 2);

        let _ = rx.try_recv().unwrap(); // live transition
        match rx.try_recv().unwrap() {
            EngineEvent::StateChanged {
                elapsed_seconds, ..
            } => assert_eq!(elapsed_seconds, 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_error_records_message() {
        let handle = SessionStatusHandle::default();
        handle.set_error("no audio".to_string()).await;
        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Error);
        assert_eq!(state.last_error.as_deref(), Some("no audio"));
    }
}
