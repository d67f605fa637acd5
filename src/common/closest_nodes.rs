use std::vec::IntoIter;

use super::{Id, Node};

#[derive(Debug, Clone)]
/// Nodes sorted by their XOR distance to a target, closest first.
pub struct ClosestNodes {
    target: Id,
    nodes: Vec<Node>,
}

impl ClosestNodes {
    pub fn new(target: Id) -> Self {
        Self {
            target,
            nodes: Vec::with_capacity(200),
        }
    }

    // === Getters ===

    pub fn target(&self) -> Id {
        self.target
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that issued a write token.
    pub fn writable(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_writable())
    }

    // === Public Methods ===

    /// Insert a node in its sorted position, ignoring nodes already present.
    pub fn add(&mut self, node: Node) {
        let seek = node.id.xor(&self.target);

        if self.nodes.iter().any(|existing| existing.id == node.id) {
            return;
        }

        let pos = self
            .nodes
            .partition_point(|probe| probe.id.xor(&self.target) < seek);

        self.nodes.insert(pos, node);
    }

    /// Keep only the `k` closest nodes.
    pub fn truncate(&mut self, k: usize) {
        self.nodes.truncate(k)
    }
}

impl IntoIterator for ClosestNodes {
    type Item = Node;
    type IntoIter = IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClosestNodes {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
