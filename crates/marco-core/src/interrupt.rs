//! Cooperative cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{ErrorInfo, MarcoError};

/// Shared stop flag plus an optional deadline.
///
/// Clones share the flag, so a signal handler can hold one copy while the
/// solvers poll another.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// Token that only stops when triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Adds an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Requests a stop; every clone observes it.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once the flag is set or the deadline has passed.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline_passed()
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns [`MarcoError::Interrupted`] when a stop was requested.
    ///
    /// The error code is `time-limit` when the deadline elapsed without an
    /// explicit trigger and `interrupted` otherwise.
    pub fn check(&self) -> Result<(), MarcoError> {
        if self.flag.load(Ordering::Relaxed) {
            return Err(MarcoError::Interrupted(ErrorInfo::new(
                "interrupted",
                "run interrupted",
            )));
        }
        if self.deadline_passed() {
            return Err(MarcoError::Interrupted(ErrorInfo::new(
                "time-limit",
                "time limit reached",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = Interrupt::new();
        let handle = token.clone();
        assert!(token.check().is_ok());
        handle.trigger();
        assert!(token.is_triggered());
        assert_eq!(token.check().unwrap_err().info().code, "interrupted");
    }

    #[test]
    fn elapsed_deadline_reports_time_limit() {
        let token = Interrupt::new().with_deadline(Instant::now());
        let err = token.check().unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(err.info().code, "time-limit");
    }
}
