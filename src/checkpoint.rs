//! Crash-safe checkpoint persistence for a dispatcher run.
//!
//! A checkpoint captures everything needed to resume a feature's
//! dispatch after a crash: the graph's completion state and the
//! breaker's counters. Writes go through a temp-file-then-rename
//! protocol so a crash mid-write can never leave a half-written file in
//! the path a loader reads from.
//!
//! # Example
//!
//! ```no_run
//! use workstream_orchestrator::checkpoint::{CheckpointManager, CheckpointDocument};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = CheckpointManager::new("/tmp/checkpoints");
//! if let Some(doc) = manager.load("feature-42")? {
//!     println!("resuming at sequence with {} completed", doc.completed.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::breaker::{Breaker, BreakerConfig, BreakerSnapshot};
use crate::graph::{Graph, GraphError, NodeId};

pub const CHECKPOINT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint file is corrupt and has been quarantined")]
    CorruptCheckpoint,

    #[error("checkpoint schema mismatch: expected version {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("graph error while restoring checkpoint: {0}")]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub depends_on: Vec<NodeId>,
    pub indegree: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: HashMap<NodeId, Vec<NodeId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointDocument {
    pub version: String,
    pub feature_id: String,
    pub timestamp: DateTime<Utc>,
    pub completed: Vec<NodeId>,
    pub failed: Vec<NodeId>,
    pub graph: GraphSnapshot,
    pub circuit_breaker: BreakerSnapshot,
}

impl CheckpointDocument {
    /// Build a checkpoint document from the dispatcher's live graph and
    /// breaker. The edge map is the prerequisite map inverted:
    /// prerequisite id -> ids that depend on it.
    pub fn from_dispatcher(
        graph: &Graph,
        breaker: &Breaker,
        feature_id: &str,
        completed: &[NodeId],
        failed: &[NodeId],
    ) -> Self {
        let mut edges: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut nodes = Vec::new();

        for id in graph.node_ids() {
            let depends_on = graph.prerequisites_of(id).unwrap_or(&[]).to_vec();
            for prereq in &depends_on {
                edges.entry(prereq.clone()).or_default().push(id.clone());
            }
            nodes.push(NodeSnapshot {
                id: id.clone(),
                depends_on,
                indegree: graph.indegree(id).unwrap_or(0),
                completed: graph.is_completed(id),
            });
        }

        Self {
            version: CHECKPOINT_VERSION.to_string(),
            feature_id: feature_id.to_string(),
            timestamp: Utc::now(),
            completed: completed.to_vec(),
            failed: failed.to_vec(),
            graph: GraphSnapshot { nodes, edges },
            circuit_breaker: breaker.snapshot(),
        }
    }

    /// Rebuild a fresh graph with the same registrations and breaker
    /// counters this document describes.
    pub fn restore_to_dispatcher(
        &self,
        breaker_config: BreakerConfig,
    ) -> Result<(Graph, Breaker), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::SchemaMismatch {
                expected: CHECKPOINT_VERSION.to_string(),
                found: self.version.clone(),
            });
        }

        let mut graph = Graph::new();
        for node in &self.graph.nodes {
            graph.register(node.id.clone(), node.depends_on.clone())?;
        }
        for id in &self.completed {
            graph.mark_complete(id)?;
        }
        for id in &self.failed {
            graph.mark_failed(id)?;
        }

        let breaker = Breaker::restore(breaker_config, self.circuit_breaker.clone());
        Ok((graph, breaker))
    }
}

/// Reads and writes checkpoint files under a directory, one file per
/// feature id, using an atomic temp-write-then-rename protocol.
pub struct CheckpointManager {
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    fn final_path(&self, feature_id: &str) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{feature_id}-checkpoint.json"))
    }

    fn temp_path(&self, feature_id: &str) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{feature_id}-checkpoint.json.tmp"))
    }

    fn corrupt_path(&self, feature_id: &str) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{feature_id}-checkpoint.json.corrupt"))
    }

    /// Serialize, write to a temp sibling, fsync, then atomically
    /// rename into place. If anything fails before the rename, the
    /// prior final file (if any) is untouched.
    pub fn save(&self, doc: &CheckpointDocument) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.checkpoint_dir)?;

        let temp_path = self.temp_path(&doc.feature_id);
        let final_path = self.final_path(&doc.feature_id);
        let payload = serde_json::to_vec_pretty(doc)?;

        {
            let mut file = File::create(&temp_path)?;
            set_owner_only_permissions(&file)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &final_path)?;
        Ok(())
    }

    /// Load the checkpoint for a feature. A missing final file means
    /// "no checkpoint" rather than an error. The temp file is never
    /// considered a valid source: a crash mid-write leaves it behind,
    /// but it is never read as if it were the real checkpoint.
    pub fn load(&self, feature_id: &str) -> Result<Option<CheckpointDocument>, CheckpointError> {
        let final_path = self.final_path(feature_id);
        if !final_path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&final_path)?;
        match serde_json::from_slice::<CheckpointDocument>(&bytes) {
            Ok(doc) => {
                if doc.version != CHECKPOINT_VERSION {
                    let found = doc.version.clone();
                    self.quarantine(feature_id)?;
                    return Err(CheckpointError::SchemaMismatch {
                        expected: CHECKPOINT_VERSION.to_string(),
                        found,
                    });
                }
                Ok(Some(doc))
            }
            Err(_) => {
                self.quarantine(feature_id)?;
                Err(CheckpointError::CorruptCheckpoint)
            }
        }
    }

    fn quarantine(&self, feature_id: &str) -> Result<(), CheckpointError> {
        let final_path = self.final_path(feature_id);
        let corrupt_path = self.corrupt_path(feature_id);
        // Best effort: if the rename itself fails there is nothing more
        // useful to do than report the original corruption.
        let _ = fs::rename(&final_path, &corrupt_path);
        Ok(())
    }

    /// Remove both the final and temp files. Idempotent: a missing file
    /// at either path is not an error.
    pub fn delete(&self, feature_id: &str) -> Result<(), CheckpointError> {
        for path in [self.final_path(feature_id), self.temp_path(feature_id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerConfig;

    fn sample_doc(feature_id: &str) -> CheckpointDocument {
        let mut graph = Graph::new();
        graph.register("a".into(), vec![]).unwrap();
        graph.register("b".into(), vec!["a".into()]).unwrap();
        graph.mark_complete(&"a".into()).unwrap();
        let breaker = Breaker::new(BreakerConfig::default());
        CheckpointDocument::from_dispatcher(
            &graph,
            &breaker,
            feature_id,
            &["a".to_string()],
            &[],
        )
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let doc = sample_doc("feature-1");
        manager.save(&doc).unwrap();

        let loaded = manager.load("feature-1").unwrap().expect("checkpoint present");
        assert_eq!(loaded.feature_id, doc.feature_id);
        assert_eq!(loaded.completed, doc.completed);
        assert!(!dir.path().join("feature-1-checkpoint.json.tmp").exists());
    }

    #[test]
    fn missing_checkpoint_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        assert!(manager.load("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn corrupt_checkpoint_is_quarantined_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let final_path = dir.path().join("feature-1-checkpoint.json");
        fs::write(&final_path, b"{ not valid json").unwrap();

        let err = manager.load("feature-1").unwrap_err();
        assert!(matches!(err, CheckpointError::CorruptCheckpoint));
        assert!(!final_path.exists());
        assert!(dir.path().join("feature-1-checkpoint.json.corrupt").exists());
    }

    #[test]
    fn stale_temp_sibling_never_contaminates_load() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let doc = sample_doc("feature-1");
        manager.save(&doc).unwrap();

        // Simulate a crash mid-write on the next save: a temp file is
        // left behind with garbage, but the previous final file is
        // untouched and must still load correctly.
        fs::write(
            dir.path().join("feature-1-checkpoint.json.tmp"),
            b"garbage",
        )
        .unwrap();

        let loaded = manager.load("feature-1").unwrap().expect("checkpoint present");
        assert_eq!(loaded.feature_id, "feature-1");
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        manager.delete("never-existed").unwrap();
        manager.delete("never-existed").unwrap();
    }

    #[test]
    fn schema_mismatch_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let mut doc = sample_doc("feature-1");
        doc.version = "9.9".to_string();
        let path = dir.path().join("feature-1-checkpoint.json");
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let err = manager.load("feature-1").unwrap_err();
        assert!(matches!(err, CheckpointError::SchemaMismatch { .. }));
        assert!(dir.path().join("feature-1-checkpoint.json.corrupt").exists());
    }

    #[test]
    fn restore_to_dispatcher_rebuilds_completed_state() {
        let doc = sample_doc("feature-1");
        let (graph, _breaker) = doc.restore_to_dispatcher(BreakerConfig::default()).unwrap();
        assert!(graph.is_completed(&"a".into()));
        assert_eq!(graph.ready(), vec!["b".to_string()]);
    }
}
