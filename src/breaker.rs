//! Three-state circuit breaker guarding workstream launches.
//!
//! `Closed` admits every launch. After `failure_threshold` consecutive
//! failures the breaker trips to `Open` and refuses launches until a
//! backoff window elapses, at which point the next call to
//! [`Breaker::may_launch`] itself performs the `Open -> HalfOpen`
//! transition and grants exactly one probe. `HalfOpen` closes again
//! once `half_open_quorum` consecutive probes succeed, or reopens (with
//! a larger backoff next time) on the first probe failure.
//!
//! # Example
//!
//! ```
//! use workstream_orchestrator::breaker::{Breaker, BreakerConfig};
//!
//! let mut breaker = Breaker::new(BreakerConfig::default());
//! assert!(breaker.may_launch());
//! breaker.on_failure();
//! breaker.on_failure();
//! breaker.on_failure();
//! assert!(!breaker.may_launch()); // tripped open
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tuning knobs for a [`Breaker`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub half_open_quorum: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            half_open_quorum: 2,
            base_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(30 * 60),
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be non-zero".to_string());
        }
        if self.half_open_quorum == 0 {
            return Err("half_open_quorum must be non-zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Everything needed to reconstruct a breaker byte-for-byte: all
/// counters and timestamps, copied verbatim on snapshot/restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub times_opened: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Breaker {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    times_opened: u32,
    last_failure_time: Option<DateTime<Utc>>,
    last_state_change: DateTime<Utc>,
    half_open_probe_in_flight: bool,
    config: BreakerConfig,
}

impl Breaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            times_opened: 0,
            last_failure_time: None,
            last_state_change: Utc::now(),
            half_open_probe_in_flight: false,
            config,
        }
    }

    /// Rebuild a breaker from a previously taken snapshot, preserving
    /// every counter and timestamp. No special resume handling is
    /// needed for an `Open` breaker: the next [`Breaker::may_launch`]
    /// call re-evaluates the backoff exactly as it would have without
    /// an interruption.
    pub fn restore(config: BreakerConfig, snapshot: BreakerSnapshot) -> Self {
        Self {
            state: snapshot.state,
            consecutive_failures: snapshot.consecutive_failures,
            consecutive_successes: snapshot.consecutive_successes,
            times_opened: snapshot.times_opened,
            last_failure_time: snapshot.last_failure_time,
            last_state_change: snapshot.last_state_change,
            half_open_probe_in_flight: false,
            config,
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            times_opened: self.times_opened,
            last_failure_time: self.last_failure_time,
            last_state_change: self.last_state_change,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    fn backoff(&self) -> Duration {
        let opens = self.times_opened.max(1);
        let factor = 2u32.saturating_pow(opens.saturating_sub(1));
        let scaled = self.config.base_backoff.saturating_mul(factor);
        scaled.min(self.config.max_backoff)
    }

    /// Admission check. Performs the `Open -> HalfOpen` transition
    /// itself when the backoff window has elapsed, and grants exactly
    /// one probe slot at a time while half-open.
    pub fn may_launch(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = Utc::now()
                    .signed_duration_since(self.last_state_change)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.backoff() {
                    self.state = BreakerState::HalfOpen;
                    self.last_state_change = Utc::now();
                    self.consecutive_successes = 0;
                    self.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if self.half_open_probe_in_flight {
                    false
                } else {
                    self.half_open_probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn on_success(&mut self) {
        match self.state {
            BreakerState::Closed => {
                self.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                self.half_open_probe_in_flight = false;
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.config.half_open_quorum {
                    self.state = BreakerState::Closed;
                    self.last_state_change = Utc::now();
                    self.consecutive_failures = 0;
                    self.consecutive_successes = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn on_failure(&mut self) {
        self.last_failure_time = Some(Utc::now());
        match self.state {
            BreakerState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.trip();
                }
            }
            BreakerState::HalfOpen => {
                self.half_open_probe_in_flight = false;
                self.trip();
            }
            BreakerState::Open => {}
        }
    }

    fn trip(&mut self) {
        self.state = BreakerState::Open;
        self.times_opened += 1;
        self.last_state_change = Utc::now();
        self.consecutive_successes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            half_open_quorum: 2,
            base_backoff: Duration::from_millis(0),
            max_backoff: Duration::from_millis(0),
        }
    }

    #[test]
    fn closed_always_admits() {
        let mut b = Breaker::new(BreakerConfig::default());
        assert!(b.may_launch());
        b.on_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let mut b = Breaker::new(BreakerConfig::default());
        b.on_failure();
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.may_launch());
    }

    #[test]
    fn half_open_allows_single_probe_then_closes_on_quorum() {
        let mut b = Breaker::new(fast_config());
        b.on_failure();
        b.on_failure();
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Open);

        assert!(b.may_launch());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(!b.may_launch(), "second concurrent probe must be refused");

        b.on_success();
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(b.may_launch());
        b.on_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_with_larger_backoff() {
        let mut b = Breaker::new(fast_config());
        b.on_failure();
        b.on_failure();
        b.on_failure();
        assert!(b.may_launch());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(b.snapshot().times_opened, 2);
    }

    #[test]
    fn backoff_grows_geometrically_and_caps() {
        let config = BreakerConfig {
            failure_threshold: 1,
            half_open_quorum: 1,
            base_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(200),
        };
        let mut b = Breaker::new(config);
        b.on_failure();
        assert_eq!(b.backoff(), Duration::from_secs(60));
        b.times_opened = 2;
        assert_eq!(b.backoff(), Duration::from_secs(120));
        b.times_opened = 3;
        assert_eq!(b.backoff(), Duration::from_secs(200), "capped at max_backoff");
    }

    #[test]
    fn snapshot_restore_round_trip_preserves_counters() {
        let mut b = Breaker::new(BreakerConfig::default());
        b.on_failure();
        b.on_failure();
        let snap = b.snapshot();
        let restored = Breaker::restore(BreakerConfig::default(), snap.clone());
        assert_eq!(restored.snapshot().consecutive_failures, snap.consecutive_failures);
        assert_eq!(restored.state(), snap.state);
    }
}
