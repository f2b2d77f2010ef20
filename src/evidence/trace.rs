//! Trace-event validation: confirms the expected phases ran and flags
//! suspicious gaps between events.
//!
//! Grounded in the append-only, infallible-capture style of this
//! codebase's trace-logging conventions: a validator here never panics
//! on odd input, it just produces warnings.

use chrono::{DateTime, Utc};

use super::model::TraceValidation;

const GAP_WARNING_THRESHOLD_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub phase: String,
    pub at: DateTime<Utc>,
}

/// Confirms that `execute` and `verify` both appeared, and that at
/// least one of `review`/`publish` appeared. `heartbeat` events are
/// ignored entirely, they exist only to keep a connection alive and
/// carry no phase information. Any two consecutive non-heartbeat
/// events more than five minutes apart produce a warning.
pub fn validate_trace(events: &[TraceEvent]) -> TraceValidation {
    let relevant: Vec<&TraceEvent> = events.iter().filter(|e| e.phase != "heartbeat").collect();

    let phases_seen: Vec<String> = {
        let mut seen = Vec::new();
        for event in &relevant {
            if !seen.contains(&event.phase) {
                seen.push(event.phase.clone());
            }
        }
        seen
    };

    let mut warnings = Vec::new();

    if !phases_seen.iter().any(|p| p == "execute") {
        warnings.push("phase 'execute' never appeared".to_string());
    }
    if !phases_seen.iter().any(|p| p == "verify") {
        warnings.push("phase 'verify' never appeared".to_string());
    }
    if !phases_seen.iter().any(|p| p == "review" || p == "publish") {
        warnings.push("neither 'review' nor 'publish' phase appeared".to_string());
    }

    for window in relevant.windows(2) {
        let gap = window[1].at.signed_duration_since(window[0].at);
        if gap.num_minutes() > GAP_WARNING_THRESHOLD_MINUTES {
            warnings.push(format!(
                "gap of {} minutes between '{}' at {} and '{}' at {}",
                gap.num_minutes(),
                window[0].phase,
                window[0].at,
                window[1].phase,
                window[1].at
            ));
        }
    }

    TraceValidation {
        phases_seen,
        warnings,
    }
}
