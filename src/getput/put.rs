//! Store an item at the closest nodes discovered for its target.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn, Instrument};

use super::{
    fetch::{start_discovery, DiscoveryParams},
    reconcile::max_seq,
};
use crate::{
    common::{Id, Item, Node},
    traversal::{Operation, Traversal, TraversalStats},
    transport::{PutRequest, Transport, TransportError},
    Error, QueryContext,
};

#[derive(Debug, Clone, PartialEq)]
/// What happened to the write sent to one node.
pub enum WriteOutcome {
    /// The node acknowledged the write.
    Stored,
    /// The node rejected the write, or never answered within the write timeout.
    Failed(TransportError),
    /// The caller's context was done before the write finished.
    Interrupted,
}

#[derive(Debug, Clone)]
/// Result of a completed put.
///
/// A put succeeds once discovery succeeded and every write was attempted,
/// individual writes may still have failed; inspect [PutResponse::stored_at].
pub struct PutResponse {
    target: Id,
    stats: TraversalStats,
    writes: Vec<(Node, WriteOutcome)>,
}

impl PutResponse {
    pub fn target(&self) -> Id {
        self.target
    }

    /// Stats of the discovery traversal.
    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Every node a write was sent to, with its outcome.
    pub fn writes(&self) -> &[(Node, WriteOutcome)] {
        &self.writes
    }

    /// Nodes that confirmed storing the item.
    pub fn stored_at(&self) -> Vec<&Node> {
        self.writes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, WriteOutcome::Stored))
            .map(|(node, _)| node)
            .collect()
    }

    /// Nodes that rejected the item or timed out.
    pub fn failures(&self) -> Vec<(&Node, &TransportError)> {
        self.writes
            .iter()
            .filter_map(|(node, outcome)| match outcome {
                WriteOutcome::Failed(error) => Some((node, error)),
                _ => None,
            })
            .collect()
    }
}

pub(crate) struct PutParams {
    pub target: Id,
    pub salt: Option<Bytes>,
    pub request_timeout: Duration,
    pub write_timeout: Duration,
}

/// Discover the current sequence number and the closest nodes holding write
/// tokens, build the item, then write it to all of them concurrently.
///
/// Only a done `ctx` during discovery fails the put.
pub(crate) async fn put<T, E, F>(
    ctx: &QueryContext,
    transport: &Arc<T>,
    engine: &E,
    params: PutParams,
    builder: F,
) -> Result<PutResponse, Error>
where
    T: Transport,
    E: Traversal,
    F: FnOnce(i64) -> Item,
{
    let target = params.target;

    let discovery = start_discovery(
        ctx,
        transport,
        engine,
        DiscoveryParams {
            target,
            // Whatever nodes hold, we need their seq.
            seq: None,
            salt: params.salt,
            request_timeout: params.request_timeout,
        },
    );

    let discovered = max_seq(
        &discovery.candidates,
        &discovery.operation.stalled(),
        ctx,
    )
    .await;
    discovery.stop();

    let current_seq = discovered?;
    trace!(?target, current_seq, "Building item");

    let item = builder(current_seq);

    let nodes = discovery
        .operation
        .closest()
        .writable()
        .cloned()
        .collect::<Vec<_>>();

    debug!(?target, current_seq, nodes = nodes.len(), "Writing item to closest nodes");

    let writes = fan_out(ctx, transport, nodes, item, params.write_timeout).await;

    Ok(PutResponse {
        target,
        stats: discovery.operation.stats(),
        writes,
    })
}

/// Write `item` to every node in its own task, each reporting into its own slot.
///
/// Returns once all writes finished, or `ctx` is done, whichever comes first.
pub(crate) async fn fan_out<T: Transport>(
    ctx: &QueryContext,
    transport: &Arc<T>,
    nodes: Vec<Node>,
    item: Item,
    timeout: Duration,
) -> Vec<(Node, WriteOutcome)> {
    let mut outcomes = vec![WriteOutcome::Interrupted; nodes.len()];
    let mut tasks = JoinSet::new();

    for (index, node) in nodes.iter().enumerate() {
        let Some(token) = node.token.clone() else {
            continue;
        };

        let address = node.address;
        let write = transport.put(
            address,
            PutRequest {
                token: token.clone(),
                item: item.clone(),
            },
        );

        tasks.spawn(
            async move {
                let outcome = match tokio::time::timeout(timeout, write).await {
                    Ok(Ok(())) => WriteOutcome::Stored,
                    Ok(Err(error)) => WriteOutcome::Failed(error),
                    Err(_) => WriteOutcome::Failed(TransportError::Timeout),
                };

                match &outcome {
                    WriteOutcome::Failed(error) => {
                        warn!(?address, ?token, ?error, "Error putting item");
                    }
                    _ => debug!(?address, ?token, "Put item"),
                }

                (index, outcome)
            }
            .in_current_span(),
        );
    }

    loop {
        tokio::select! {
            biased;
            reason = ctx.done() => {
                debug!(?reason, pending = tasks.len(), "Put interrupted");
                tasks.abort_all();
                break;
            }
            joined = tasks.join_next() => match joined {
                Some(Ok((index, outcome))) => {
                    if let Some(slot) = outcomes.get_mut(index) {
                        *slot = outcome;
                    }
                }
                Some(Err(error)) => debug!(?error, "Write task ended abnormally"),
                None => break,
            },
        }
    }

    nodes.into_iter().zip(outcomes).collect()
}
