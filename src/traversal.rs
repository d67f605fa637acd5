//! Seam to the node discovery engine that drives a traversal toward a target.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::common::{ClosestNodes, Id, Node};

/// Queries one node, returning what the engine needs to extend its frontier.
pub type QueryFn = Arc<dyn Fn(Node) -> BoxFuture<'static, QueryResult> + Send + Sync>;

/// Returns `false` for nodes the engine should not query.
pub type NodeFilter = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// Iterative nearest-node lookup, scheduling queries to the closest nodes
/// known so far with bounded concurrency.
pub trait Traversal: Send + Sync {
    type Operation: Operation;

    /// Start a traversal toward `target`. It makes no progress until
    /// [Operation::add_nodes] seeds it.
    fn start(&self, target: Id, query: QueryFn, filter: NodeFilter) -> Self::Operation;
}

/// Handle to a running traversal.
pub trait Operation: Send + Sync + 'static {
    /// Add nodes to the frontier.
    fn add_nodes(&self, nodes: Vec<Node>);

    /// Fires once the traversal can make no further progress.
    fn stalled(&self) -> Signal;

    /// Abort the traversal and release its resources. Idempotent.
    fn stop(&self);

    /// Closest responding nodes so far, each with the write token it issued.
    fn closest(&self) -> ClosestNodes;

    fn stats(&self) -> TraversalStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Outcome of querying a single node.
pub struct QueryResult {
    /// The node that replied, with its write token.
    ///
    /// None if the node did not reply, or replied without a token, either way
    /// it must not end up in the closest set used for writing.
    pub responder: Option<Node>,
    /// Closer nodes returned by the responder.
    pub closer_nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Shape of a traversal, passed through to callers uninterpreted.
pub struct TraversalStats {
    /// Number of nodes queried.
    pub addrs_tried: usize,
    /// Number of nodes that replied with a write token.
    pub responses: usize,
}

#[derive(Debug, Clone, Default)]
/// One-shot, level-triggered notification.
pub struct Signal(CancellationToken);

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.cancel()
    }

    pub fn is_fired(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once [Signal::fire] was called, immediately if it already was.
    pub async fn fired(&self) {
        self.0.cancelled().await
    }
}
