//! SHA-256 canonicalization and hash-chain verification for envelopes.

use sha2::{Digest, Sha256};

use super::model::EvidenceEnvelope;
use super::EvidenceError;

/// Matches a lower-case 64-character hex SHA-256 digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Serialize the envelope with `provenance.hash` forced empty, for
/// hashing. Map keys are sorted by `serde_json`'s default `Value`
/// ordering (`BTreeMap`-backed), giving a stable byte sequence for the
/// same logical content regardless of field insertion order upstream.
pub fn canonicalize(envelope: &EvidenceEnvelope) -> Result<String, EvidenceError> {
    let mut value = serde_json::to_value(envelope)?;
    if let Some(provenance) = value.get_mut("provenance") {
        provenance["hash"] = serde_json::Value::String(String::new());
    }
    let canonical: serde_json::Value = serde_json::from_str(&serde_json::to_string(&value)?)?;
    serde_json::to_string(&canonical).map_err(EvidenceError::from)
}

pub fn compute_hash(envelope: &EvidenceEnvelope) -> Result<String, EvidenceError> {
    let canonical = canonicalize(envelope)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex_encode(&hasher.finalize()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Walk a sequence of chained envelopes, checking that each one's
/// `hash_prev` matches its predecessor's `hash` and that `sequence`
/// increases by exactly one.
pub fn verify_chain(envelopes: &[EvidenceEnvelope]) -> Result<(), EvidenceError> {
    for window in envelopes.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        if next.provenance.hash_prev.as_deref() != Some(prev.provenance.hash.as_str()) {
            return Err(EvidenceError::ChainBreak(format!(
                "envelope {} hash_prev does not match envelope {}'s hash",
                next.provenance.run_id, prev.provenance.run_id
            )));
        }
        if next.provenance.sequence != prev.provenance.sequence + 1 {
            return Err(EvidenceError::ChainBreak(format!(
                "envelope {} sequence {} does not follow {}",
                next.provenance.run_id, next.provenance.sequence, prev.provenance.sequence
            )));
        }
    }
    Ok(())
}
