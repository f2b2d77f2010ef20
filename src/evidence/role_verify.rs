//! Scans a log stream for a role envelope, the first JSON object that
//! looks like `{run_id, role, status, summary, artifacts}`, and
//! cross-checks it against the run this verification is for.

use serde::Deserialize;

use super::EvidenceError;

const CONNECTIVITY_ERROR_MARKERS: &[&str] = &[
    "connection refused",
    "rate limit exceeded",
    "provider unavailable",
    "upstream connect error",
];

#[derive(Debug, Clone, Deserialize)]
struct RoleEnvelopeLine {
    run_id: String,
    role: String,
    status: String,
    #[allow(dead_code)]
    summary: String,
    artifacts: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleVerdict {
    pub run_id: String,
    pub role: String,
    pub status: String,
    pub artifact_count: usize,
}

/// Scan `log_lines` for the first JSON object carrying all of
/// `run_id, role, status, summary, artifacts`. Fails if a
/// connectivity/provider-error marker is seen on an earlier line, or if
/// no matching object is ever found.
pub fn verify_role_envelope(
    log_lines: impl Iterator<Item = String>,
    expected_role: &str,
    expected_run_id: &str,
) -> Result<RoleVerdict, EvidenceError> {
    for line in log_lines {
        let lowercase = line.to_ascii_lowercase();
        if CONNECTIVITY_ERROR_MARKERS
            .iter()
            .any(|marker| lowercase.contains(marker))
        {
            return Err(EvidenceError::MissingRoleEnvelope);
        }

        if let Ok(parsed) = serde_json::from_str::<RoleEnvelopeLine>(&line) {
            if parsed.role != expected_role || parsed.run_id != expected_run_id {
                return Err(EvidenceError::InvalidProvenance(format!(
                    "role envelope role/run_id mismatch: expected {expected_role}/{expected_run_id}, found {}/{}",
                    parsed.role, parsed.run_id
                )));
            }
            if parsed.status != "ok" && parsed.status != "needs_changes" {
                return Err(EvidenceError::InvalidProvenance(format!(
                    "unexpected role envelope status: {}",
                    parsed.status
                )));
            }
            return Ok(RoleVerdict {
                run_id: parsed.run_id,
                role: parsed.role,
                status: parsed.status,
                artifact_count: parsed.artifacts.len(),
            });
        }
    }

    Err(EvidenceError::MissingRoleEnvelope)
}
