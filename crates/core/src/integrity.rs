//! Strike counting for official sessions.
//!
//! The monitor is fed attention signals observed on the client surface. Each
//! signal is one strike; the two sources are counted independently, so a
//! single app switch that hides the surface and drops focus costs two strikes.

use serde::{Deserialize, Serialize};

/// Default number of strikes that voids a session.
pub const DEFAULT_STRIKE_THRESHOLD: u32 = 6;

/// Something the student did that took them off the assessment surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionSignal {
    /// The surface became hidden (tab or application switch).
    SurfaceHidden,
    /// The surface lost input focus.
    FocusLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikePolicy {
    threshold: u32,
}

impl StrikePolicy {
    /// A threshold of zero is raised to one.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for StrikePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_STRIKE_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Never attached (mock sessions) or not yet attached.
    Detached,
    Attached,
    /// Removed for good; a monitor is never re-attached.
    TornDown,
}

/// What the monitor decided about one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Monitor not attached; nothing was counted.
    Ignored,
    Strike { count: u32 },
    /// Threshold reached by this signal. Reported exactly once.
    Lockout { count: u32 },
}

#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    policy: StrikePolicy,
    strikes: u32,
    state: MonitorState,
}

impl IntegrityMonitor {
    #[must_use]
    pub fn new(policy: StrikePolicy) -> Self {
        Self {
            policy,
            strikes: 0,
            state: MonitorState::Detached,
        }
    }

    /// Start counting. No effect once torn down.
    pub fn attach(&mut self) {
        if self.state == MonitorState::Detached {
            self.state = MonitorState::Attached;
        }
    }

    pub fn tear_down(&mut self) {
        self.state = MonitorState::TornDown;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == MonitorState::Attached
    }

    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    #[must_use]
    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    #[must_use]
    pub fn policy(&self) -> StrikePolicy {
        self.policy
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.policy.threshold().saturating_sub(self.strikes)
    }

    /// Count one signal. Tears itself down when the threshold is reached.
    pub fn record(&mut self, _signal: AttentionSignal) -> MonitorVerdict {
        if !self.is_active() {
            return MonitorVerdict::Ignored;
        }

        self.strikes = self.strikes.saturating_add(1);
        if self.strikes >= self.policy.threshold() {
            self.tear_down();
            return MonitorVerdict::Lockout {
                count: self.strikes,
            };
        }

        MonitorVerdict::Strike {
            count: self.strikes,
        }
    }
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new(StrikePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> IntegrityMonitor {
        let mut monitor = IntegrityMonitor::default();
        monitor.attach();
        monitor
    }

    #[test]
    fn detached_monitor_counts_nothing() {
        let mut monitor = IntegrityMonitor::default();
        for _ in 0..10 {
            assert_eq!(monitor.record(AttentionSignal::FocusLost), MonitorVerdict::Ignored);
        }
        assert_eq!(monitor.strikes(), 0);
    }

    #[test]
    fn lockout_fires_once_at_threshold() {
        let mut monitor = attached();
        for k in 1..6 {
            assert_eq!(
                monitor.record(AttentionSignal::SurfaceHidden),
                MonitorVerdict::Strike { count: k }
            );
        }
        assert_eq!(
            monitor.record(AttentionSignal::FocusLost),
            MonitorVerdict::Lockout { count: 6 }
        );
        assert_eq!(monitor.state(), MonitorState::TornDown);
        assert_eq!(monitor.record(AttentionSignal::FocusLost), MonitorVerdict::Ignored);
        assert_eq!(monitor.strikes(), 6);
    }

    #[test]
    fn both_sources_count_separately() {
        let mut monitor = attached();
        monitor.record(AttentionSignal::SurfaceHidden);
        monitor.record(AttentionSignal::FocusLost);
        assert_eq!(monitor.strikes(), 2);
        assert_eq!(monitor.remaining(), 4);
    }

    #[test]
    fn torn_down_monitor_cannot_reattach() {
        let mut monitor = attached();
        monitor.tear_down();
        monitor.attach();
        assert!(!monitor.is_active());
    }

    #[test]
    fn zero_threshold_is_raised_to_one() {
        let mut monitor = IntegrityMonitor::new(StrikePolicy::new(0));
        monitor.attach();
        assert_eq!(
            monitor.record(AttentionSignal::FocusLost),
            MonitorVerdict::Lockout { count: 1 }
        );
    }
}
