//! Tamper-evident evidence envelopes produced at each workflow boundary.
//!
//! An envelope has nine required sections (`intent`, `plan`,
//! `execution`, `verification`, `review`, `risk_notes`, `boundary`,
//! `provenance`, `trace`) and an optional `trace_validation` block.
//! Envelopes chain together via `provenance.hash`/`hash_prev` the same
//! way an append-only log does: each one's hash covers its own content
//! (with the hash field itself blanked out), and the next envelope
//! records the previous one's hash.
//!
//! ```ignore
//! // `sample_envelope` below is test-only scaffolding; a real caller
//! // builds an EvidenceEnvelope from its own run data instead.
//! use workstream_orchestrator::evidence::hash::{compute_hash, is_sha256_hex};
//! let envelope = sample_envelope("run-1", 1, None);
//! let hash = compute_hash(&envelope).unwrap();
//! assert!(is_sha256_hex(&hash));
//! ```

pub mod attestation;
pub mod hash;
pub mod model;
pub mod role_verify;
pub mod trace;
pub mod validate;

use thiserror::Error;

pub use attestation::{into_attestation, validate_statement};
pub use model::{
    Boundary, Compliance, ContextSource, EvidenceEnvelope, Provenance, Statement, Subject, Trace,
    TraceValidation,
};
pub use role_verify::{verify_role_envelope, RoleVerdict};
pub use trace::{validate_trace, TraceEvent};

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("missing required section: {0}")]
    MissingSection(&'static str),

    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("invalid provenance: {0}")]
    InvalidProvenance(String),

    #[error("trace is missing a PR URL")]
    MissingPrUrl,

    #[error("hash format error: {0}")]
    HashFormat(String),

    #[error("hash chain broken: {0}")]
    ChainBreak(String),

    #[error("no role envelope found in the log stream")]
    MissingRoleEnvelope,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
