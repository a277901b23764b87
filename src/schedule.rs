//! Debounced deferred work.
//!
//! The manager runs on the host's event loop and never sleeps. A pending task
//! is a deadline; scheduling again replaces it (last event wins), and the host
//! calls [`crate::ClusterManager::poll`] to run whatever is due.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// A cancellable, restartable one-shot timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Debounce {
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `delay` after `now`, replacing any pending deadline.
    ///
    /// Returns `true` when a pending deadline was superseded.
    pub fn schedule(&mut self, now: Instant, delay: Duration) -> bool {
        self.deadline.replace(now + delay).is_some()
    }

    /// Disarm the timer. Returns `true` if something was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the deadline if it has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Categories a pending recluster pass has to cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclusterScope {
    All,
    Categories(BTreeSet<String>),
}

impl ReclusterScope {
    pub fn category(category: impl Into<String>) -> Self {
        Self::Categories(BTreeSet::from([category.into()]))
    }

    /// Scope for an optional category filter (`None` means every category).
    pub fn for_filter(category: Option<&str>) -> Self {
        category.map_or(Self::All, Self::category)
    }

    /// Union of two scopes.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Categories(mut left), Self::Categories(right)) => {
                left.extend(right);
                Self::Categories(left)
            }
            _ => Self::All,
        }
    }

    pub fn includes(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Categories(categories) => categories.contains(category),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_fires_once_after_deadline() {
        let start = Instant::now();
        let mut timer = Debounce::new();
        assert!(!timer.schedule(start, Duration::from_millis(100)));

        assert!(!timer.fire_if_due(start + Duration::from_millis(99)));
        assert!(timer.fire_if_due(start + Duration::from_millis(100)));
        assert!(!timer.fire_if_due(start + Duration::from_millis(500)));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_debounce_supersede_restarts_window() {
        let start = Instant::now();
        let mut timer = Debounce::new();
        timer.schedule(start, Duration::from_millis(100));
        assert!(timer.schedule(start + Duration::from_millis(80), Duration::from_millis(100)));

        assert!(!timer.fire_if_due(start + Duration::from_millis(150)));
        assert!(timer.fire_if_due(start + Duration::from_millis(180)));
    }

    #[test]
    fn test_debounce_cancel() {
        let start = Instant::now();
        let mut timer = Debounce::new();
        assert!(!timer.cancel());
        timer.schedule(start, Duration::ZERO);
        assert!(timer.cancel());
        assert!(!timer.fire_if_due(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_scope_merge() {
        let scope = ReclusterScope::category("crime").merge(ReclusterScope::category("traffic"));
        assert!(scope.includes("crime"));
        assert!(scope.includes("traffic"));
        assert!(!scope.includes("weather"));

        let scope = scope.merge(ReclusterScope::for_filter(None));
        assert_eq!(scope, ReclusterScope::All);
        assert!(scope.includes("weather"));
    }
}
