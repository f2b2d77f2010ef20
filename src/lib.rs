//! Dependency-aware scheduling for interdependent workstreams, with
//! checkpointing, circuit breaking, and tamper-evident evidence capture
//! at each boundary.
//!
//! # Layout
//!
//! - [`graph`] - the dependency graph a feature's workstreams form.
//! - [`breaker`] - the three-state circuit breaker guarding launches.
//! - [`checkpoint`] - crash-safe, atomic checkpoint persistence.
//! - [`dispatcher`] - the bounded-concurrency scheduling loop.
//! - [`evidence`] - envelope model, hashing, trace validation, attestation.
//! - [`resolver`] - workstream/tracker/issue id classification and lookup.
//! - [`shutdown`] - the cooperative cancellation token used by the dispatcher.
//! - [`config`] - dispatcher and breaker configuration.

pub mod breaker;
pub mod checkpoint;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evidence;
pub mod graph;
pub mod logging;
pub mod resolver;
pub mod shutdown;

pub use breaker::{Breaker, BreakerConfig, BreakerState};
pub use checkpoint::{CheckpointDocument, CheckpointError, CheckpointManager};
pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherError, WorkerFn, WorkstreamOutcome};
pub use error::OrchestratorError;
pub use graph::{Graph, GraphError, NodeId};
pub use resolver::{classify, IdKind, ResolvedId, ResolverError};
pub use shutdown::CancellationToken;
