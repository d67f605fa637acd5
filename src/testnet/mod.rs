//! In-process network of storage nodes, to exercise get and put end to end.

mod server;
mod tokens;
mod traversal;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

use crate::{
    common::{ClosestNodes, Id, Item, Node},
    transport::{GetReply, GetRequest, PutRequest, Transport, TransportError},
    Config, GetPut,
};

pub use server::{NodeBehavior, StorageNode, MAX_SALT_SIZE, MAX_VALUES, MAX_VALUE_SIZE};
pub use tokens::{Tokens, TOKEN_ROTATE_INTERVAL};
pub use traversal::{IterativeOperation, IterativeTraversal, DEFAULT_ALPHA, MAX_BUCKET_SIZE_K};

/// Number of nodes every traversal starts from.
pub const BOOTSTRAP_NODES: usize = 8;

#[derive(Debug)]
/// A network of [StorageNode]s reachable through a [TestNetwork] transport.
///
/// Every node knows every other node, and answers with the
/// [MAX_BUCKET_SIZE_K] closest it knows to the requested target.
pub struct Testnet {
    network: TestNetwork,
}

impl Testnet {
    /// Create a network of `count` honest nodes with random ids.
    pub fn new(count: usize) -> Self {
        let nodes = (0..count)
            .map(|i| {
                let address = SocketAddr::from((
                    [10, (i >> 16) as u8, (i >> 8) as u8, i as u8],
                    6881,
                ));

                Arc::new(StorageNode::new(Id::random(), address))
            })
            .collect::<Vec<_>>();

        let by_address = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.address(), index))
            .collect();

        Self {
            network: TestNetwork {
                inner: Arc::new(NetworkInner {
                    local_addr: SocketAddr::from(([127, 0, 0, 1], 6881)),
                    nodes,
                    by_address,
                }),
            },
        }
    }

    // === Getters ===

    pub fn nodes(&self) -> &[Arc<StorageNode>] {
        &self.network.inner.nodes
    }

    /// A transport to this network.
    pub fn network(&self) -> TestNetwork {
        self.network.clone()
    }

    /// A client with the default [IterativeTraversal] and [Config].
    pub fn client(&self) -> GetPut<TestNetwork, IterativeTraversal> {
        self.client_with_config(Config::default())
    }

    pub fn client_with_config(&self, config: Config) -> GetPut<TestNetwork, IterativeTraversal> {
        GetPut::with_config(self.network(), IterativeTraversal::default(), config)
    }

    /// The `count` nodes closest to `target`.
    pub fn closest(&self, target: &Id, count: usize) -> Vec<Arc<StorageNode>> {
        self.network.inner.closest(target, count)
    }

    pub fn node(&self, address: &SocketAddr) -> Option<&Arc<StorageNode>> {
        self.network.inner.node(address)
    }

    // === Public Methods ===

    /// Store `item` at the [MAX_BUCKET_SIZE_K] nodes closest to its target.
    pub fn seed(&self, item: Item) -> Vec<Arc<StorageNode>> {
        let nodes = self.closest(&item.target(), MAX_BUCKET_SIZE_K);

        for node in &nodes {
            node.store(item.clone());
        }

        nodes
    }

    /// Returns `false` if no node listens on `address`.
    pub fn set_behavior(&self, address: &SocketAddr, behavior: NodeBehavior) -> bool {
        match self.node(address) {
            Some(node) => {
                node.set_behavior(behavior);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
/// [Transport] delivering requests to the nodes of a [Testnet].
pub struct TestNetwork {
    inner: Arc<NetworkInner>,
}

#[derive(Debug)]
struct NetworkInner {
    /// Address requests appear to come from.
    local_addr: SocketAddr,
    nodes: Vec<Arc<StorageNode>>,
    by_address: HashMap<SocketAddr, usize>,
}

impl NetworkInner {
    fn node(&self, address: &SocketAddr) -> Option<&Arc<StorageNode>> {
        self.by_address
            .get(address)
            .and_then(|index| self.nodes.get(*index))
    }

    /// Returns the node at `address` if it can be reached.
    fn reachable(&self, address: SocketAddr) -> Result<Arc<StorageNode>, TransportError> {
        match self.node(&address) {
            Some(node) if node.behavior() != NodeBehavior::Offline => Ok(node.clone()),
            _ => Err(TransportError::Unreachable(address)),
        }
    }

    fn closest(&self, target: &Id, count: usize) -> Vec<Arc<StorageNode>> {
        let mut nodes = self.nodes.clone();
        nodes.sort_by_key(|node| node.id().xor(target));
        nodes.truncate(count);

        nodes
    }

    async fn get(
        self: Arc<Self>,
        address: SocketAddr,
        request: GetRequest,
    ) -> Result<GetReply, TransportError> {
        let node = self.reachable(address)?;

        if node.behavior() == NodeBehavior::Unresponsive {
            return futures::future::pending().await;
        }

        let nodes = self.closest_nodes(&request.target);

        Ok(node.handle_get(self.local_addr, &request, nodes))
    }

    async fn put(
        self: Arc<Self>,
        address: SocketAddr,
        request: PutRequest,
    ) -> Result<(), TransportError> {
        let node = self.reachable(address)?;

        if matches!(
            node.behavior(),
            NodeBehavior::Unresponsive | NodeBehavior::HangWrites
        ) {
            return futures::future::pending().await;
        }

        node.handle_put(self.local_addr, request)
            .map_err(TransportError::ErrorResponse)
    }

    fn closest_nodes(&self, target: &Id) -> Vec<Node> {
        let mut closest = ClosestNodes::new(*target);

        for node in self.closest(target, MAX_BUCKET_SIZE_K) {
            closest.add(node.node());
        }

        closest.into_iter().collect()
    }
}

impl Transport for TestNetwork {
    fn get(
        &self,
        address: SocketAddr,
        request: GetRequest,
    ) -> BoxFuture<'static, Result<GetReply, TransportError>> {
        self.inner.clone().get(address, request).boxed()
    }

    fn put(
        &self,
        address: SocketAddr,
        request: PutRequest,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        self.inner.clone().put(address, request).boxed()
    }

    fn starting_nodes(&self) -> Vec<Node> {
        self.inner
            .nodes
            .iter()
            .take(BOOTSTRAP_NODES)
            .map(|node| node.node())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_closest_nodes() {
        let testnet = Testnet::new(50);
        let item = Item::Immutable(bytes::Bytes::from_static(b"Hello World!"));
        let target = item.target();

        let seeded = testnet.seed(item.clone());

        assert_eq!(seeded.len(), MAX_BUCKET_SIZE_K);
        assert!(seeded.iter().all(|node| node.item(&target) == Some(item.clone())));

        let farthest = seeded
            .iter()
            .map(|node| node.id().xor(&target))
            .max()
            .unwrap();

        let unseeded = testnet
            .nodes()
            .iter()
            .filter(|node| node.item(&target).is_none())
            .collect::<Vec<_>>();

        assert_eq!(unseeded.len(), 50 - MAX_BUCKET_SIZE_K);
        assert!(unseeded.iter().all(|node| node.id().xor(&target) > farthest));
    }

    #[tokio::test]
    async fn offline_node_unreachable() {
        let testnet = Testnet::new(5);
        let address = testnet.nodes()[0].address();

        assert!(testnet.set_behavior(&address, NodeBehavior::Offline));

        let result = testnet
            .network()
            .get(
                address,
                GetRequest {
                    target: Id::random(),
                    seq: None,
                },
            )
            .await;

        assert_eq!(result, Err(TransportError::Unreachable(address)));
    }
}
