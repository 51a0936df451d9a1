//! Cancellation for in-flight calls: a shared token plus an optional deadline.
//!
//! Cloning a token shares its cancelled flag. The retry loop checks it between
//! attempts and sleeps on it while backing off; the curl transport polls it
//! from its progress callback so a running transfer stops as well.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Shared {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Cancels a call from another thread, or after a deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token that is only cancelled by [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also counts as cancelled once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            shared: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Same flag, with `deadline` applied (the earlier one wins if both are set).
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            shared: Arc::clone(&self.shared),
            deadline: Some(deadline),
        }
    }

    /// Request cancellation and wake every thread sleeping on this token.
    pub fn cancel(&self) {
        let mut cancelled = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.shared.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.deadline_passed(Instant::now()) {
            return true;
        }
        *self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Blocks for `duration` or until cancelled, whichever comes first.
    /// Returns `true` if the full duration elapsed.
    ///
    /// The mutex is released while waiting, so `cancel` from another thread
    /// takes effect immediately.
    pub fn sleep(&self, duration: Duration) -> bool {
        let wake_at = Instant::now() + duration;
        let mut cancelled = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            let now = Instant::now();
            if *cancelled || self.deadline_passed(now) {
                return false;
            }
            if now >= wake_at {
                return true;
            }
            let until = match self.deadline {
                Some(d) => d.min(wake_at),
                None => wake_at,
            };
            cancelled = self
                .shared
                .wake
                .wait_timeout(cancelled, until - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn deadline_passed(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.remaining().is_none());
        assert!(token.sleep(Duration::from_millis(5)));
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(!token.sleep(Duration::from_secs(10)));
    }

    #[test]
    fn cancel_wakes_sleeper_promptly() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn deadline_cuts_sleep_short() {
        let token = CancelToken::with_timeout(Duration::from_millis(30));
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(token.is_cancelled());
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn child_keeps_earlier_deadline_and_shares_flag() {
        let parent = CancelToken::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_deadline(Instant::now() + Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
