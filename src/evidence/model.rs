//! The evidence envelope's fixed-shape document model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single boundary-compliance check: what paths were declared allowed,
/// what was actually touched, and whether the run stayed in bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boundary {
    pub allowed: Vec<String>,
    pub control: Vec<String>,
    pub forbidden: Vec<String>,
    pub touched: Vec<String>,
    pub out_of_boundary_paths: Vec<String>,
    pub compliance: Compliance,
}

impl Boundary {
    /// Derive `out_of_boundary_paths` and the compliance verdict from
    /// the declared prefixes and the observed touched paths.
    pub fn derive(
        allowed: Vec<String>,
        control: Vec<String>,
        forbidden: Vec<String>,
        touched: Vec<String>,
    ) -> Self {
        let in_bounds_prefixes: Vec<&String> = allowed.iter().chain(control.iter()).collect();
        let out_of_boundary: Vec<String> = touched
            .iter()
            .filter(|path| {
                let is_forbidden = forbidden.iter().any(|f| path.starts_with(f.as_str()));
                let is_allowed = in_bounds_prefixes.iter().any(|p| path.starts_with(p.as_str()));
                is_forbidden || !is_allowed
            })
            .cloned()
            .collect();

        let compliance = if out_of_boundary.is_empty() {
            Compliance {
                ok: true,
                reason: String::new(),
            }
        } else {
            Compliance {
                ok: false,
                reason: format!(
                    "{} touched path(s) fall outside the declared boundary",
                    out_of_boundary.len()
                ),
            }
        };

        Self {
            allowed,
            control,
            forbidden,
            touched,
            out_of_boundary_paths: out_of_boundary,
            compliance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compliance {
    pub ok: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub run_id: String,
    pub orchestrator: String,
    pub runtime: String,
    pub model: String,
    pub phase: String,
    pub role: String,
    pub captured_at: DateTime<Utc>,
    pub source_issue_id: String,
    pub artifact_id: String,
    pub contract_version: String,
    pub hash_algorithm: String,
    pub sequence: u64,
    pub payload_digest: String,
    #[serde(default)]
    pub hash: String,
    pub hash_prev: Option<String>,
    pub prompt_hash: Option<String>,
    pub context_sources: Vec<ContextSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub issue_ids: Vec<String>,
    pub branch: String,
    pub commits: Vec<String>,
    pub pr_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceValidation {
    pub phases_seen: Vec<String>,
    pub warnings: Vec<String>,
}

/// The nine required sections plus the optional trace-validation block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEnvelope {
    pub intent: serde_json::Value,
    pub plan: serde_json::Value,
    pub execution: serde_json::Value,
    pub verification: serde_json::Value,
    pub review: serde_json::Value,
    pub risk_notes: serde_json::Value,
    pub boundary: Boundary,
    pub provenance: Provenance,
    pub trace: Trace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_validation: Option<TraceValidation>,
}

/// in-toto subject: a named artifact and its digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub digest: HashMap<String, String>,
}

pub const STATEMENT_TYPE: &str = "https://in-toto.io/Statement/v0.1";
pub const PREDICATE_TYPE: &str = "https://sdp.dev/attestation/coding-workflow/v1";

/// in-toto statement wrapping an envelope as the predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "_type")]
    pub type_: String,
    pub subject: Vec<Subject>,
    #[serde(rename = "predicateType")]
    pub predicate_type: String,
    pub predicate: EvidenceEnvelope,
}
