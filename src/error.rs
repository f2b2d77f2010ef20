//! Crate-wide error re-exports.
//!
//! Each subsystem owns its own error enum (`GraphError`, `CheckpointError`,
//! `DispatcherError`, `EvidenceError`, `ResolverError`) following this
//! codebase's convention of a `thiserror`-derived enum per error domain
//! with `#[from]` conversions for the I/O/serialization errors it wraps.
//! This module re-exports them together for callers who want a single
//! import, and provides a top-level error that boxes any of them for
//! callers who would rather not match on every subsystem's variants.

use thiserror::Error;

pub use crate::checkpoint::CheckpointError;
pub use crate::dispatcher::DispatcherError;
pub use crate::evidence::EvidenceError;
pub use crate::graph::GraphError;
pub use crate::resolver::ResolverError;

/// A catch-all error for callers that want to propagate any subsystem
/// failure with `?` without matching on its specific shape.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("dispatcher error: {0}")]
    Dispatcher(#[from] DispatcherError),

    #[error("evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("resolver error: {0}")]
    Resolver(#[from] ResolverError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
