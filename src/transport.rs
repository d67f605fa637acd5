//! The node transport a [crate::GetPut] client sends queries and writes through.

use std::net::SocketAddr;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::common::{Id, Item, Node, WriteToken};

/// Sends BEP44 `get` and `put` requests to individual nodes.
///
/// Implementations own the wire encoding, transaction matching and routing
/// table, and must be cheap to call concurrently: a traversal keeps many
/// requests in flight at once. Returned futures are dropped when the request
/// is no longer needed, which should abandon it.
pub trait Transport: Send + Sync + 'static {
    /// Send a get request to a node.
    fn get(
        &self,
        address: SocketAddr,
        request: GetRequest,
    ) -> BoxFuture<'static, Result<GetReply, TransportError>>;

    /// Send a put request, carrying the node's write token, to a node.
    fn put(
        &self,
        address: SocketAddr,
        request: PutRequest,
    ) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Nodes to seed a new traversal with, usually the closest nodes in the routing table.
    fn starting_nodes(&self) -> Vec<Node>;

    /// Returns `false` for nodes a traversal should never query.
    fn node_filter(&self, _node: &Node) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    pub target: Id,
    /// Only return a mutable value if its sequence number is greater than this.
    pub seq: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    pub token: WriteToken,
    pub item: Item,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// A node's raw, untrusted, reply to a get request.
pub struct GetReply {
    pub responder_id: Option<Id>,
    pub token: Option<WriteToken>,
    /// Nodes the responder knows that are close to the target.
    pub nodes: Vec<Node>,
    pub v: Option<Bytes>,
    pub k: Option<[u8; 32]>,
    pub seq: Option<i64>,
    pub sig: Option<[u8; 64]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Error response from a remote node.
pub struct ErrorSpecific {
    pub code: i32,
    pub description: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Failure of a single request to a single node.
pub enum TransportError {
    /// No response arrived in time.
    #[error("Request timed out")]
    Timeout,

    /// Request could not be sent to the node at all.
    #[error("Node {0} is unreachable")]
    Unreachable(SocketAddr),

    /// The node answered with an error.
    #[error("Error response {}: {}", .0.code, .0.description)]
    ErrorResponse(ErrorSpecific),
}
