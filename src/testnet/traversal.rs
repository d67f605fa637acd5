//! Minimal iterative lookup, enough to drive get and put over a [super::Testnet].

use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, Instrument};

use crate::{
    common::{ClosestNodes, Id, Node},
    traversal::{NodeFilter, Operation, QueryFn, QueryResult, Signal, Traversal, TraversalStats},
};

/// Default number of concurrent queries per traversal.
pub const DEFAULT_ALPHA: usize = 15;
/// Default number of closest nodes a traversal converges on.
pub const MAX_BUCKET_SIZE_K: usize = 20;

#[derive(Debug, Clone, Copy)]
/// Concurrently queries the closest known nodes to the target, adding closer
/// nodes found in the replies, until no closer nodes that weren't already
/// queried are left.
pub struct IterativeTraversal {
    alpha: usize,
    k: usize,
}

impl Default for IterativeTraversal {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            k: MAX_BUCKET_SIZE_K,
        }
    }
}

impl IterativeTraversal {
    /// Maximum queries in flight at once.
    pub fn alpha(mut self, alpha: usize) -> Self {
        self.alpha = alpha.max(1);
        self
    }

    /// Size of the closest set the traversal converges on.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }
}

impl Traversal for IterativeTraversal {
    type Operation = IterativeOperation;

    fn start(&self, target: Id, query: QueryFn, filter: NodeFilter) -> IterativeOperation {
        let (nodes_sender, nodes_receiver) = flume::unbounded();

        let operation = IterativeOperation {
            k: self.k,
            nodes: nodes_sender,
            progress: Arc::new(Mutex::new(Progress {
                responders: ClosestNodes::new(target),
                stats: TraversalStats::default(),
            })),
            stalled: Signal::new(),
            stop: CancellationToken::new(),
        };

        let state = TraversalState {
            target,
            alpha: self.alpha,
            k: self.k,
            query,
            filter,
            nodes: nodes_receiver,
            progress: operation.progress.clone(),
            stalled: operation.stalled.clone(),
            stop: operation.stop.clone(),
        };

        trace!(?target, "New traversal");
        tokio::spawn(state.run().in_current_span());

        operation
    }
}

#[derive(Debug)]
/// Handle to a running [IterativeTraversal], stops it when dropped.
pub struct IterativeOperation {
    k: usize,
    nodes: flume::Sender<Vec<Node>>,
    progress: Arc<Mutex<Progress>>,
    stalled: Signal,
    stop: CancellationToken,
}

#[derive(Debug)]
struct Progress {
    /// Responding nodes that issued a write token.
    responders: ClosestNodes,
    stats: TraversalStats,
}

impl Operation for IterativeOperation {
    fn add_nodes(&self, nodes: Vec<Node>) {
        let _ = self.nodes.send(nodes);
    }

    fn stalled(&self) -> Signal {
        self.stalled.clone()
    }

    fn stop(&self) {
        self.stop.cancel()
    }

    fn closest(&self) -> ClosestNodes {
        let mut closest = lock(&self.progress).responders.clone();
        closest.truncate(self.k);

        closest
    }

    fn stats(&self) -> TraversalStats {
        lock(&self.progress).stats
    }
}

impl Drop for IterativeOperation {
    fn drop(&mut self) {
        self.stop.cancel()
    }
}

struct TraversalState {
    target: Id,
    alpha: usize,
    k: usize,
    query: QueryFn,
    filter: NodeFilter,
    nodes: flume::Receiver<Vec<Node>>,
    progress: Arc<Mutex<Progress>>,
    stalled: Signal,
    stop: CancellationToken,
}

impl TraversalState {
    async fn run(self) {
        let mut candidates = ClosestNodes::new(self.target);
        let mut visited: HashSet<SocketAddr> = HashSet::new();
        let mut inflight: FuturesUnordered<BoxFuture<'static, QueryResult>> =
            FuturesUnordered::new();
        let mut seeded = false;

        loop {
            // Visit the closest candidates not visited yet, alpha at a time.
            let to_visit = candidates
                .nodes()
                .iter()
                .take(self.k)
                .filter(|node| !visited.contains(&node.address))
                .take(self.alpha.saturating_sub(inflight.len()))
                .cloned()
                .collect::<Vec<_>>();

            for node in to_visit {
                visited.insert(node.address);
                lock(&self.progress).stats.addrs_tried += 1;

                inflight.push((self.query)(node));
            }

            if seeded && inflight.is_empty() && self.nodes.is_empty() {
                debug!(
                    target = ?self.target,
                    candidates = candidates.len(),
                    visited = visited.len(),
                    "Traversal stalled"
                );
                self.stalled.fire();

                return;
            }

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    trace!(target = ?self.target, "Traversal stopped");
                    return;
                }
                batch = self.nodes.recv_async() => match batch {
                    Ok(batch) => {
                        seeded = true;

                        for node in batch {
                            if (self.filter)(&node) {
                                candidates.add(node);
                            }
                        }
                    }
                    // The operation handle was dropped.
                    Err(_) => return,
                },
                Some(result) = inflight.next(), if !inflight.is_empty() => {
                    if let Some(responder) = result.responder {
                        let mut progress = lock(&self.progress);
                        progress.stats.responses += 1;
                        progress.responders.add(responder);
                    }

                    for node in result.closer_nodes {
                        if !visited.contains(&node.address) && (self.filter)(&node) {
                            candidates.add(node);
                        }
                    }
                }
            }
        }
    }
}

fn lock(progress: &Mutex<Progress>) -> MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}
