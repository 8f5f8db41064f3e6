//! Composite-banner gating.
//!
//! The banner appears once the visible record count has sat at the expected
//! value for a fixed delay. Any count away from that value hides it at once.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Where the banner is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerState {
    /// Count is not at the threshold.
    Hidden,
    /// Count reached the threshold; waiting for `deadline`.
    Pending {
        /// When the banner becomes visible.
        deadline: Instant,
    },
    /// Count held at the threshold for the full delay.
    Shown,
}

/// Three-state gate driving the composite banner.
#[derive(Debug, Clone)]
pub struct BannerGate {
    threshold: usize,
    delay: Duration,
    state: BannerState,
}

impl BannerGate {
    /// Create a hidden gate.
    #[must_use]
    pub fn new(threshold: usize, delay: Duration) -> Self {
        Self {
            threshold,
            delay,
            state: BannerState::Hidden,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BannerState {
        self.state
    }

    /// Record count that arms the gate.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Delay between arming and showing.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Check whether the banner is visible.
    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.state == BannerState::Shown
    }

    /// When the pending timer fires, if one is armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            BannerState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Re-evaluate against the record count of a new snapshot.
    ///
    /// A repeated threshold count keeps the running timer. Returns `true` if
    /// the state changed.
    pub fn observe(&mut self, count: usize, now: Instant) -> bool {
        let next = match (count == self.threshold, self.state) {
            (false, _) => BannerState::Hidden,
            (true, BannerState::Hidden) => BannerState::Pending {
                deadline: now + self.delay,
            },
            (true, current) => current,
        };
        self.transition(next)
    }

    /// The pending timer fired at `now`.
    ///
    /// Stale firings (nothing pending, or before the deadline) are ignored.
    /// Returns `true` if the banner became visible.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            BannerState::Pending { deadline } if now >= deadline => {
                self.transition(BannerState::Shown)
            }
            _ => false,
        }
    }

    /// Drop any pending timer and hide the banner.
    pub fn cancel(&mut self) {
        self.transition(BannerState::Hidden);
    }

    fn transition(&mut self, next: BannerState) -> bool {
        if next == self.state {
            return false;
        }
        debug!("Composite banner {:?} -> {:?}", self.state, next);
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(2);

    fn gate() -> BannerGate {
        BannerGate::new(11, DELAY)
    }

    #[test]
    fn test_new_gate_is_hidden() {
        let gate = gate();
        assert_eq!(gate.state(), BannerState::Hidden);
        assert!(gate.deadline().is_none());
        assert_eq!(gate.threshold(), 11);
        assert_eq!(gate.delay(), DELAY);
    }

    #[test]
    fn test_threshold_count_arms_timer() {
        let mut gate = gate();
        let now = Instant::now();

        assert!(gate.observe(11, now));
        assert_eq!(gate.deadline(), Some(now + DELAY));
        assert!(!gate.is_shown());
    }

    #[test]
    fn test_other_counts_stay_hidden() {
        let mut gate = gate();
        let now = Instant::now();
        assert!(!gate.observe(0, now));
        assert!(!gate.observe(10, now));
        assert!(!gate.observe(12, now));
        assert_eq!(gate.state(), BannerState::Hidden);
    }

    #[test]
    fn test_fire_after_deadline_shows() {
        let mut gate = gate();
        let now = Instant::now();
        gate.observe(11, now);

        assert!(gate.fire(now + DELAY));
        assert!(gate.is_shown());
        assert!(gate.deadline().is_none());
    }

    #[test]
    fn test_early_fire_is_ignored() {
        let mut gate = gate();
        let now = Instant::now();
        gate.observe(11, now);

        assert!(!gate.fire(now + Duration::from_millis(1900)));
        assert_eq!(gate.deadline(), Some(now + DELAY));
    }

    #[test]
    fn test_revoked_before_deadline_never_shows() {
        let mut gate = gate();
        let now = Instant::now();
        gate.observe(11, now);

        assert!(gate.observe(12, now + Duration::from_millis(1900)));
        assert_eq!(gate.state(), BannerState::Hidden);
        // The stale timer firing later changes nothing
        assert!(!gate.fire(now + DELAY));
        assert!(!gate.is_shown());
    }

    #[test]
    fn test_repeated_threshold_keeps_deadline() {
        let mut gate = gate();
        let now = Instant::now();
        gate.observe(11, now);

        assert!(!gate.observe(11, now + Duration::from_secs(1)));
        assert_eq!(gate.deadline(), Some(now + DELAY));
    }

    #[test]
    fn test_shown_hides_when_count_changes() {
        let mut gate = gate();
        let now = Instant::now();
        gate.observe(11, now);
        gate.fire(now + DELAY);

        assert!(!gate.observe(11, now + Duration::from_secs(3)));
        assert!(gate.is_shown());

        assert!(gate.observe(3, now + Duration::from_secs(4)));
        assert_eq!(gate.state(), BannerState::Hidden);
    }

    #[test]
    fn test_rearm_restarts_delay() {
        let mut gate = gate();
        let start = Instant::now();
        gate.observe(11, start);
        gate.observe(12, start + Duration::from_secs(1));

        let rearmed = start + Duration::from_secs(5);
        gate.observe(11, rearmed);
        assert_eq!(gate.deadline(), Some(rearmed + DELAY));
    }

    #[test]
    fn test_cancel_clears_pending() {
        let mut gate = gate();
        let now = Instant::now();
        gate.observe(11, now);

        gate.cancel();
        assert!(gate.deadline().is_none());
        assert!(!gate.fire(now + DELAY));
    }

    #[test]
    fn test_zero_delay_fires_immediately() {
        let mut gate = BannerGate::new(1, Duration::ZERO);
        let now = Instant::now();
        gate.observe(1, now);
        assert!(gate.fire(now));
    }
}
