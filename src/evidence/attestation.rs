//! in-toto attestation wrapping for an evidence envelope.

use super::model::{EvidenceEnvelope, Statement, Subject, PREDICATE_TYPE, STATEMENT_TYPE};
use super::validate::{require_pr_url, validate};
use super::EvidenceError;

/// Wrap an envelope as the predicate of an in-toto statement, using the
/// external-interface literals verbatim: statement type
/// `https://in-toto.io/Statement/v0.1` and predicate type
/// `https://sdp.dev/attestation/coding-workflow/v1`.
pub fn into_attestation(envelope: EvidenceEnvelope, subjects: Vec<Subject>) -> Statement {
    Statement {
        type_: STATEMENT_TYPE.to_string(),
        subject: subjects,
        predicate_type: PREDICATE_TYPE.to_string(),
        predicate: envelope,
    }
}

/// Validate a [`Statement`] produced by [`into_attestation`]: the
/// statement and predicate type literals must match exactly, the
/// subject list must be non-empty, and the wrapped envelope must itself
/// satisfy [`validate`]. When `require_pr` is set, the wrapped
/// envelope's trace must also carry a non-empty `pr_url`.
pub fn validate_statement(statement: &Statement, require_pr: bool) -> Result<(), EvidenceError> {
    if statement.type_ != STATEMENT_TYPE {
        return Err(EvidenceError::InvalidProvenance(format!(
            "statement type must be {STATEMENT_TYPE}, found {}",
            statement.type_
        )));
    }
    if statement.predicate_type != PREDICATE_TYPE {
        return Err(EvidenceError::InvalidProvenance(format!(
            "predicate type must be {PREDICATE_TYPE}, found {}",
            statement.predicate_type
        )));
    }
    if statement.subject.is_empty() {
        return Err(EvidenceError::MissingSection("subject"));
    }

    validate(&statement.predicate)?;
    if require_pr {
        require_pr_url(&statement.predicate)?;
    }
    Ok(())
}
