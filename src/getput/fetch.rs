//! Drive a traversal toward a target, publishing every valid item nodes return.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, Instrument, Span};

use super::classify::{classify, Classification};
use crate::{
    common::{Id, Item, Node},
    traversal::{NodeFilter, Operation, QueryFn, QueryResult, Traversal},
    transport::{GetRequest, GetReply, Transport, TransportError},
    QueryContext,
};

/// A running discovery traversal and the stream of valid items it finds.
pub(crate) struct Discovery<O> {
    /// Valid items, in the order nodes returned them.
    ///
    /// Rendezvous channel: a query holds on to its item until the single
    /// consumer takes it, or the query's own timeout fires.
    pub candidates: flume::Receiver<Item>,
    pub operation: Arc<O>,
    /// Releases the supervisor task once the discovery is dropped.
    _release: DropGuard,
}

impl<O: Operation> Discovery<O> {
    /// Stop the traversal, it is safe to call more than once.
    pub fn stop(&self) {
        self.operation.stop()
    }
}

pub(crate) struct DiscoveryParams {
    pub target: Id,
    pub seq: Option<i64>,
    pub salt: Option<Bytes>,
    pub request_timeout: Duration,
}

/// Start a traversal toward `target`, querying every node visited with `get`.
///
/// A supervisor task stops the traversal as soon as either `ctx` is done or
/// the traversal stalls, so engine resources are always released.
pub(crate) fn start_discovery<T, E>(
    ctx: &QueryContext,
    transport: &Arc<T>,
    engine: &E,
    params: DiscoveryParams,
) -> Discovery<E::Operation>
where
    T: Transport,
    E: Traversal,
{
    let (sender, candidates) = flume::bounded::<Item>(0);

    let target = params.target;
    trace!(?target, seq = ?params.seq, "Starting discovery");

    let query: QueryFn = {
        let ctx = ctx.clone();
        let transport = transport.clone();
        let span = Span::current();

        Arc::new(move |node: Node| {
            query_node(
                ctx.clone(),
                transport.clone(),
                sender.clone(),
                node,
                GetRequest {
                    target,
                    seq: params.seq,
                },
                params.salt.clone(),
                params.request_timeout,
            )
            .instrument(span.clone())
            .boxed()
        })
    };

    let filter: NodeFilter = {
        let transport = transport.clone();
        Arc::new(move |node: &Node| transport.node_filter(node))
    };

    let operation = Arc::new(engine.start(target, query, filter));

    let release = CancellationToken::new();

    tokio::spawn(
        supervise(ctx.clone(), operation.clone(), release.clone()).instrument(Span::current()),
    );

    operation.add_nodes(transport.starting_nodes());

    Discovery {
        candidates,
        operation,
        _release: release.drop_guard(),
    }
}

async fn supervise<O: Operation>(ctx: QueryContext, operation: Arc<O>, release: CancellationToken) {
    let stalled = operation.stalled();

    tokio::select! {
        reason = ctx.done() => {
            trace!(?reason, "Stopping discovery");
            operation.stop();
        }
        _ = stalled.fired() => {
            trace!("Discovery stalled");
            operation.stop();
        }
        _ = release.cancelled() => {}
    }
}

async fn query_node<T: Transport>(
    ctx: QueryContext,
    transport: Arc<T>,
    sender: flume::Sender<Item>,
    node: Node,
    request: GetRequest,
    salt: Option<Bytes>,
    timeout: Duration,
) -> QueryResult {
    let deadline = Instant::now() + timeout;
    let target = request.target;
    let from = node.address;

    let reply = tokio::select! {
        biased;
        _ = ctx.done() => return QueryResult::default(),
        reply = tokio::time::timeout_at(deadline, transport.get(from, request)) => reply,
    };

    let reply = match reply {
        Ok(Ok(reply)) => reply,
        Ok(Err(TransportError::Timeout)) | Err(_) => {
            trace!(?target, ?from, "Get query timed out");
            return QueryResult::default();
        }
        Ok(Err(error)) => {
            debug!(?target, ?from, ?error, "Get query failed");
            return QueryResult::default();
        }
    };

    match classify(&reply, &target, salt.as_deref()) {
        Classification::Immutable(item) | Classification::Mutable(item) => {
            tokio::select! {
                biased;
                _ = ctx.done() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    trace!(?target, ?from, "Dropped item, nobody received it in time");
                }
                _ = sender.send_async(item) => {}
            }
        }
        Classification::Invalid(error) => {
            debug!(?target, ?from, responder_id = ?reply.responder_id, ?error, "Invalid get response");
        }
        Classification::Empty => {}
    }

    query_result(node, reply)
}

/// Report the responder to the engine only if it issued a write token.
fn query_result(node: Node, reply: GetReply) -> QueryResult {
    let responder = reply.token.map(|token| {
        Node::new_with_token(reply.responder_id.unwrap_or(node.id), node.address, token)
    });

    QueryResult {
        responder,
        closer_nodes: reply.nodes,
    }
}
