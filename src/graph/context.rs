//! The audio processing context that the routing graph runs in.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

const RUNNING: u8 = 0;
const SUSPENDED: u8 = 1;
const CLOSED: u8 = 2;

/// Run state and format of the mix bus. Cheap to clone; all clones share
/// the same state.
#[derive(Clone)]
pub struct MixContext {
    sample_rate: u32,
    state: Arc<AtomicU8>,
}

impl MixContext {
    pub fn new(sample_rate: u32) -> Result<Self, EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::Unsupported(
                "mix context requires a nonzero sample rate".to_string(),
            ));
        }
        Ok(Self {
            sample_rate,
            state: Arc::new(AtomicU8::new(RUNNING)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => ContextState::Running,
            SUSPENDED => ContextState::Suspended,
            _ => ContextState::Closed,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ContextState::Running
    }

    /// Suspend processing. No effect once closed.
    pub fn suspend(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, SUSPENDED, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Resume processing. No effect once closed.
    pub fn resume(&self) {
        let _ = self
            .state
            .compare_exchange(SUSPENDED, RUNNING, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Close the context. Returns false when it was already closed, so a
    /// second release never runs.
    pub fn close(&self) -> bool {
        let prev = self.state.swap(CLOSED, Ordering::SeqCst);
        if prev == CLOSED {
            debug!("Mix context already closed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_is_unsupported() {
        assert!(matches!(
            MixContext::new(0),
            Err(EngineError::Unsupported(_))
        ));
    }

    #[test]
    fn test_suspend_resume_cycle() {
        let ctx = MixContext::new(16_000).unwrap();
        assert!(ctx.is_running());
        ctx.suspend();
        assert_eq!(ctx.state(), ContextState::Suspended);
        ctx.resume();
        assert!(ctx.is_running());
    }

    #[test]
    fn test_close_is_guarded() {
        let ctx = MixContext::new(16_000).unwrap();
        assert!(ctx.close());
        assert!(!ctx.close());
        assert_eq!(ctx.state(), ContextState::Closed);
    }

    #[test]
    fn test_closed_context_ignores_resume() {
        let ctx = MixContext::new(16_000).unwrap();
        ctx.close();
        ctx.resume();
        assert_eq!(ctx.state(), ContextState::Closed);
        ctx.suspend();
        assert_eq!(ctx.state(), ContextState::Closed);
    }
}
