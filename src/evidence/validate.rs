//! Structural validation of an evidence envelope.

use super::hash::is_sha256_hex;
use super::model::EvidenceEnvelope;
use super::EvidenceError;

/// Checks every invariant required of a standalone envelope: all
/// sections present (enforced by the type itself once
/// deserialized, but re-checked here for callers who build one by
/// hand), a non-empty compliance reason whenever `compliance.ok` is
/// false, every declared provenance string field non-empty, and every
/// hash-shaped field matching the SHA-256 hex pattern.
pub fn validate(envelope: &EvidenceEnvelope) -> Result<(), EvidenceError> {
    if !envelope.boundary.compliance.ok && envelope.boundary.compliance.reason.is_empty() {
        return Err(EvidenceError::InvalidBoundary(
            "compliance.reason must be non-empty when compliance.ok is false".to_string(),
        ));
    }

    check_non_empty("provenance.run_id", &envelope.provenance.run_id)?;
    check_non_empty("provenance.orchestrator", &envelope.provenance.orchestrator)?;
    check_non_empty("provenance.runtime", &envelope.provenance.runtime)?;
    check_non_empty("provenance.model", &envelope.provenance.model)?;
    check_non_empty("provenance.phase", &envelope.provenance.phase)?;
    check_non_empty("provenance.role", &envelope.provenance.role)?;
    check_non_empty("provenance.source_issue_id", &envelope.provenance.source_issue_id)?;
    check_non_empty("provenance.artifact_id", &envelope.provenance.artifact_id)?;
    check_non_empty("provenance.contract_version", &envelope.provenance.contract_version)?;

    check_hash_field("provenance.hash", &envelope.provenance.hash)?;
    if let Some(prev) = &envelope.provenance.hash_prev {
        check_hash_field("provenance.hash_prev", prev)?;
    }
    check_hash_field("provenance.payload_digest", &envelope.provenance.payload_digest)?;
    if let Some(prompt_hash) = &envelope.provenance.prompt_hash {
        check_hash_field("provenance.prompt_hash", prompt_hash)?;
    }

    for source in &envelope.provenance.context_sources {
        if source.source_type.is_empty() {
            return Err(EvidenceError::InvalidProvenance(
                "context_sources entry has an empty type".to_string(),
            ));
        }
        if source.path.is_empty() {
            return Err(EvidenceError::InvalidProvenance(
                "context_sources entry has an empty path".to_string(),
            ));
        }
        check_hash_field("context_sources[].sha256", &source.sha256)?;
    }

    if envelope.provenance.hash_algorithm != "sha256" {
        return Err(EvidenceError::InvalidProvenance(format!(
            "unsupported hash_algorithm: {}",
            envelope.provenance.hash_algorithm
        )));
    }

    Ok(())
}

/// Requires a non-empty `pr_url` in [`super::model::Trace`]. Kept
/// separate from [`validate`] since not every envelope is expected to
/// carry a PR link (only ones past the publish phase are).
pub fn require_pr_url(envelope: &EvidenceEnvelope) -> Result<(), EvidenceError> {
    match &envelope.trace.pr_url {
        Some(url) if !url.is_empty() => Ok(()),
        _ => Err(EvidenceError::MissingPrUrl),
    }
}

fn check_non_empty(field: &str, value: &str) -> Result<(), EvidenceError> {
    if value.is_empty() {
        return Err(EvidenceError::InvalidProvenance(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

fn check_hash_field(field: &str, value: &str) -> Result<(), EvidenceError> {
    if value.is_empty() {
        return Ok(());
    }
    if !is_sha256_hex(value) {
        return Err(EvidenceError::HashFormat(format!(
            "{field} is not a 64-character lowercase hex SHA-256 digest: {value}"
        )));
    }
    Ok(())
}
