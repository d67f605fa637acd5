//! Struct and implementation of a node discovered during a traversal.
use std::net::SocketAddr;

use super::{Id, WriteToken};

#[derive(Debug, Clone, PartialEq)]
/// Node entry discovered during a traversal.
pub struct Node {
    pub id: Id,
    pub address: SocketAddr,
    /// Write token issued by this node, nodes without one can't be written to.
    pub token: Option<WriteToken>,
}

impl Node {
    /// Creates a new Node from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> Node {
        Node {
            id,
            address,
            token: None,
        }
    }

    pub fn new_with_token(id: Id, address: SocketAddr, token: WriteToken) -> Node {
        Node {
            id,
            address,
            token: Some(token),
        }
    }

    /// Creates a node with random Id for testing purposes.
    pub fn random() -> Node {
        Node::new(Id::random(), SocketAddr::from(([0, 0, 0, 0], 0)))
    }

    pub fn is_writable(&self) -> bool {
        self.token.is_some()
    }
}
