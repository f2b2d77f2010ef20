//! Bounded-concurrency scheduling loop tying the graph, breaker, and
//! checkpoint manager together.
//!
//! The main loop's only suspension point is waiting for the next
//! worker completion signal. Graph and breaker mutation happens only
//! in that loop, under one lock per completion; workers report their
//! outcome over a channel and never touch shared state themselves.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::breaker::Breaker;
use crate::checkpoint::{CheckpointDocument, CheckpointError, CheckpointManager};
use crate::config::DispatcherConfig;
use crate::graph::{Graph, GraphError, NodeId};
use crate::shutdown::CancellationToken;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// The result of dispatching a single workstream.
#[derive(Debug, Clone)]
pub struct WorkstreamOutcome {
    pub workstream_id: NodeId,
    pub success: bool,
    pub error: Option<String>,
}

/// A workstream's unit of work. Returns `Ok(())` on success or an
/// error message describing the failure. Workers may take arbitrarily
/// long and are never subject to a per-task timeout.
pub type WorkerFn = Arc<
    dyn Fn(NodeId) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync,
>;

struct WorkerCompletion {
    id: NodeId,
    result: Result<(), String>,
}

/// Schedules workstreams from a [`Graph`] at a bounded concurrency,
/// checkpointing progress and consulting a [`Breaker`] before every
/// launch.
pub struct Dispatcher {
    graph: Graph,
    breaker: Breaker,
    config: DispatcherConfig,
    worker: WorkerFn,
}

impl Dispatcher {
    pub fn new(graph: Graph, config: DispatcherConfig, worker: WorkerFn) -> Self {
        let breaker = Breaker::new(config.breaker);
        Self {
            graph,
            breaker,
            config,
            worker,
        }
    }

    fn checkpoint_manager(&self) -> CheckpointManager {
        CheckpointManager::new(&self.config.checkpoint_dir)
    }

    /// Run the dispatch loop to completion, or until `cancel` is
    /// requested and every already-launched worker has settled.
    pub async fn run(&mut self, cancel: Option<CancellationToken>) -> Vec<WorkstreamOutcome> {
        let manager = self.checkpoint_manager();

        if self.config.checkpoint_enabled {
            if let Ok(Some(doc)) = manager.load(&self.config.feature_id) {
                if let Ok((graph, breaker)) = doc.restore_to_dispatcher(self.config.breaker) {
                    self.graph = graph;
                    self.breaker = breaker;
                }
            }
        }

        let mut outcomes: Vec<WorkstreamOutcome> = Vec::new();
        let mut completed: Vec<NodeId> = Vec::new();
        let mut failed: Vec<NodeId> = Vec::new();
        let mut in_flight: HashSet<NodeId> = HashSet::new();

        let (tx, mut rx) = mpsc::channel::<WorkerCompletion>(self.config.concurrency.max(1));

        loop {
            let cancelled = cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false);

            if !cancelled {
                let ready: Vec<NodeId> = self
                    .graph
                    .ready()
                    .into_iter()
                    .filter(|id| !in_flight.contains(id))
                    .collect();

                for id in ready {
                    if in_flight.len() >= self.config.concurrency {
                        break;
                    }
                    if !self.breaker.may_launch() {
                        break;
                    }
                    in_flight.insert(id.clone());
                    let worker = Arc::clone(&self.worker);
                    let tx = tx.clone();
                    let task_id = id.clone();
                    tokio::spawn(async move {
                        let result = worker(task_id.clone()).await;
                        let _ = tx.send(WorkerCompletion { id: task_id, result }).await;
                    });
                }
            }

            if in_flight.is_empty() {
                // Nothing launched and nothing outstanding. Either the
                // whole graph settled, or progress is impossible right
                // now (a cycle stranded the remainder, the breaker is
                // blocking every candidate, or cancellation was
                // requested), either way there is nothing left to wait
                // on, so stop rather than spin forever.
                break;
            }

            match rx.recv().await {
                Some(completion) => {
                    in_flight.remove(&completion.id);
                    match completion.result {
                        Ok(()) => {
                            self.breaker.on_success();
                            let _ = self.graph.mark_complete(&completion.id);
                            completed.push(completion.id.clone());
                            outcomes.push(WorkstreamOutcome {
                                workstream_id: completion.id,
                                success: true,
                                error: None,
                            });
                        }
                        Err(message) => {
                            self.breaker.on_failure();
                            let _ = self.graph.mark_failed(&completion.id);
                            failed.push(completion.id.clone());
                            outcomes.push(WorkstreamOutcome {
                                workstream_id: completion.id,
                                success: false,
                                error: Some(message),
                            });
                        }
                    }

                    if self.config.checkpoint_enabled {
                        let doc = CheckpointDocument::from_dispatcher(
                            &self.graph,
                            &self.breaker,
                            &self.config.feature_id,
                            &completed,
                            &failed,
                        );
                        if let Err(e) = manager.save(&doc) {
                            tracing::warn!("checkpoint save failed: {e}");
                        }
                    }
                }
                None => break,
            }
        }

        if self.config.checkpoint_enabled && self.graph.all_settled() {
            if let Err(e) = manager.delete(&self.config.feature_id) {
                tracing::warn!("checkpoint delete failed: {e}");
            }
        }

        outcomes
    }
}

/// Serializes access to a graph/breaker pair for callers that want to
/// share a dispatcher across tasks. Not used by [`Dispatcher::run`]
/// itself (its single-threaded loop needs no lock), but exposed for
/// callers building their own coordination on top.
pub type SharedState = Arc<Mutex<(Graph, Breaker)>>;
