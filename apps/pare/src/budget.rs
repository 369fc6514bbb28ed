//! # Session Budget
//!
//! Cooperative limits shared by the session, the bisector and the Ctrl-C
//! handler. Exhausting the budget never interrupts a running trial; it only
//! stops new trials from being issued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Trial count, deadline and cancellation flag of one session.
#[derive(Debug)]
pub struct Budget {
    max_trials: Option<u64>,
    deadline: Option<Instant>,
    issued: AtomicU64,
    cancelled: AtomicBool,
}

impl Budget {
    /// Budget with optional trial and wall-clock limits, starting now.
    ///
    /// A time limit too large to represent as a deadline means no deadline.
    #[must_use]
    pub fn new(max_trials: Option<u64>, max_time: Option<Duration>) -> Self {
        Self {
            max_trials,
            deadline: max_time.and_then(|t| Instant::now().checked_add(t)),
            issued: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    /// No limits; only [`Budget::cancel`] stops it.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(None, None)
    }

    /// Reserve one trial. Returns false once the budget is spent.
    pub fn try_acquire(&self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        let previous = self.issued.fetch_add(1, Ordering::SeqCst);
        match self.max_trials {
            Some(max) if previous >= max => {
                self.issued.fetch_sub(1, Ordering::SeqCst);
                false
            }
            _ => true,
        }
    }

    /// Trials issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Stop issuing trials.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True after [`Budget::cancel`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True when no further trial may be issued.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return true;
        }
        self.max_trials
            .is_some_and(|max| self.issued.load(Ordering::SeqCst) >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_limit() {
        let budget = Budget::new(Some(2), None);
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
        assert_eq!(budget.issued(), 2);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn cancel_stops_unlimited_budget() {
        let budget = Budget::unlimited();
        assert!(budget.try_acquire());
        budget.cancel();
        assert!(budget.is_cancelled());
        assert!(!budget.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let budget = Budget::new(None, Some(Duration::from_secs(5)));
        assert!(!budget.is_exhausted());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(budget.is_exhausted());
    }

    #[test]
    fn unrepresentable_time_limit_means_no_deadline() {
        let budget = Budget::new(None, Some(Duration::from_secs(u64::MAX)));
        assert!(!budget.is_exhausted());
        assert!(budget.try_acquire());
    }
}
