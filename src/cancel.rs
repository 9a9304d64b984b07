//! Cancellation tokens threaded through every kernel entry point.
//!
//! The token is a shared flag plus an optional deadline. Kernel loops
//! poll it at coarse granularity (every [`CHECK_INTERVAL`] vertices)
//! so a triggered token stops long computations within a bounded
//! number of steps. Timeouts are the caller's responsibility: attach a
//! deadline to the token before invoking a tool and the kernel will
//! observe it as a cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::EngineError;

/// How many loop iterations pass between cancellation polls.
pub const CHECK_INTERVAL: usize = 1000;

/// Cooperative cancellation token.
///
/// Clones share the underlying flag, so cancelling any clone cancels
/// all of them. A deadline set at construction time is carried by
/// value into clones.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Create a token that never fires unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that fires once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Trigger cancellation for this token and all its clones.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether the token has fired (explicitly or by deadline).
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Return `Err(Cancelled)` if the token has fired.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Poll the token every [`CHECK_INTERVAL`] iterations.
    ///
    /// Intended for tight loops: `token.check_at(i)?` is a no-op for
    /// most values of `i`.
    #[inline]
    pub fn check_at(&self, iteration: usize) -> Result<(), EngineError> {
        if iteration % CHECK_INTERVAL == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_is_live() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.check(), Err(EngineError::Cancelled));
    }

    #[test]
    fn test_expired_deadline_cancels() {
        let token = CancelToken::with_timeout(Duration::from_millis(0));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_check_at_skips_between_intervals() {
        let token = CancelToken::new();
        token.cancel();
        // Off-interval iterations do not poll.
        assert!(token.check_at(1).is_ok());
        assert!(token.check_at(999).is_ok());
        // Interval boundaries do.
        assert!(token.check_at(0).is_err());
        assert!(token.check_at(1000).is_err());
    }
}
