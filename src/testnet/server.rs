//! In-process storage node answering BEP44 requests.

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use super::tokens::Tokens;
use crate::{
    common::{Id, Item, MutableItem, Node},
    transport::{ErrorSpecific, GetReply, GetRequest, PutRequest},
};

/// Maximum number of immutable or mutable values a node stores.
pub const MAX_VALUES: usize = 1000;
/// Maximum size of a value in bytes.
pub const MAX_VALUE_SIZE: usize = 1000;
/// Maximum size of a salt in bytes.
pub const MAX_SALT_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How a [StorageNode] treats incoming requests.
pub enum NodeBehavior {
    #[default]
    Honest,
    /// Never replies.
    Unresponsive,
    /// Can't be reached at all.
    Offline,
    /// Replies with tampered values.
    Corrupt,
    /// Answers get requests honestly but rejects every put.
    RejectWrites,
    /// Answers get requests honestly but never replies to a put.
    HangWrites,
}

#[derive(Debug)]
/// A node of a [super::Testnet].
///
/// Supports [BEP_0044](https://www.bittorrent.org/beps/bep_0044.html) get and put,
/// but doesn't implement any rate-limiting or blocking.
pub struct StorageNode {
    id: Id,
    address: SocketAddr,
    state: Mutex<NodeState>,
}

#[derive(Debug)]
struct NodeState {
    behavior: NodeBehavior,
    tokens: Tokens,
    immutable_values: LruCache<Id, Bytes>,
    mutable_values: LruCache<Id, MutableItem>,
}

impl StorageNode {
    pub fn new(id: Id, address: SocketAddr) -> Self {
        let capacity = NonZeroUsize::new(MAX_VALUES).unwrap_or(NonZeroUsize::MIN);

        Self {
            id,
            address,
            state: Mutex::new(NodeState {
                behavior: NodeBehavior::Honest,
                tokens: Tokens::new(),
                immutable_values: LruCache::new(capacity),
                mutable_values: LruCache::new(capacity),
            }),
        }
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn node(&self) -> Node {
        Node::new(self.id, self.address)
    }

    pub fn behavior(&self) -> NodeBehavior {
        self.state().behavior
    }

    /// Returns the item stored at `target`, if any.
    pub fn item(&self, target: &Id) -> Option<Item> {
        let mut state = self.state();

        if let Some(value) = state.immutable_values.get(target) {
            return Some(Item::Immutable(value.clone()));
        }

        state
            .mutable_values
            .get(target)
            .map(|item| Item::Mutable(item.clone()))
    }

    // === Public Methods ===

    pub fn set_behavior(&self, behavior: NodeBehavior) {
        self.state().behavior = behavior;
    }

    /// Store an item directly, skipping token and sequence number checks.
    pub fn store(&self, item: Item) {
        let target = item.target();
        let mut state = self.state();

        match item {
            Item::Immutable(value) => {
                state.immutable_values.put(target, value);
            }
            Item::Mutable(item) => {
                state.mutable_values.put(target, item);
            }
        }
    }

    /// Handle a get request, `nodes` are the closest nodes this node knows to the target.
    pub fn handle_get(&self, from: SocketAddr, request: &GetRequest, nodes: Vec<Node>) -> GetReply {
        let mut state = self.state();

        if state.tokens.should_update() {
            state.tokens.rotate()
        }

        let mut reply = GetReply {
            responder_id: Some(self.id),
            token: Some(state.tokens.generate_token(from)),
            nodes,
            ..Default::default()
        };

        let target = request.target;

        if request.seq.is_none() {
            if let Some(v) = state.immutable_values.get(&target) {
                reply.v = Some(v.clone());
            }
        }

        if reply.v.is_none() {
            if let Some(item) = state.mutable_values.get(&target) {
                let no_more_recent_value = request
                    .seq
                    .map(|request_seq| item.seq() <= request_seq)
                    .unwrap_or(false);

                reply.seq = Some(item.seq());

                if !no_more_recent_value {
                    reply.v = Some(Bytes::copy_from_slice(item.value()));
                    reply.k = Some(*item.key());
                    reply.sig = Some(*item.signature());
                }
            }
        }

        if state.behavior == NodeBehavior::Corrupt {
            corrupt(&mut reply);
        }

        reply
    }

    /// Handle a put request, validating the token, the item and its sequence number.
    pub fn handle_put(&self, from: SocketAddr, request: PutRequest) -> Result<(), ErrorSpecific> {
        let mut state = self.state();
        let PutRequest { token, item } = request;
        let target = item.target();

        if state.behavior == NodeBehavior::RejectWrites {
            return Err(error(201, "Generic Error"));
        }

        if !state.tokens.validate(from, &token) {
            debug!(?target, ?from, ?token, "Invalid token");
            return Err(error(203, "Bad token"));
        }

        if item.value().len() > MAX_VALUE_SIZE {
            debug!(?target, ?from, size = ?item.value().len(), "Message (v field) too big.");
            return Err(error(205, "Message (v field) too big."));
        }

        match item {
            Item::Immutable(value) => {
                state.immutable_values.put(target, value);
            }
            Item::Mutable(item) => {
                if item.salt().map(|salt| salt.len() > MAX_SALT_SIZE).unwrap_or(false) {
                    return Err(error(207, "salt (salt field) too big."));
                }

                if let Err(error) = MutableItem::from_dht_message(
                    target,
                    item.key(),
                    item.value(),
                    item.seq(),
                    item.signature(),
                    item.salt(),
                ) {
                    debug!(?target, ?from, ?error, "Invalid signature");
                    return Err(self::error(206, "Invalid signature"));
                }

                if let Some(previous) = state.mutable_values.get(&target) {
                    if item.seq() < previous.seq()
                        || (item.seq() == previous.seq() && item.value() != previous.value())
                    {
                        debug!(?target, ?from, "Sequence number less than current.");
                        return Err(error(302, "Sequence number less than current."));
                    }
                }

                state.mutable_values.put(target, item);
            }
        }

        Ok(())
    }

    // === Private Methods ===

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn error(code: i32, description: &str) -> ErrorSpecific {
    ErrorSpecific {
        code,
        description: description.to_string(),
    }
}

/// Tamper with the value and claim a much newer sequence number.
fn corrupt(reply: &mut GetReply) {
    let mut v = reply
        .v
        .as_deref()
        .map(|v| v.to_vec())
        .unwrap_or_else(|| b"not the value you are looking for".to_vec());

    if let Some(last) = v.last_mut() {
        *last ^= 0xff;
    }

    reply.v = Some(v.into());
    reply.seq = reply.seq.map(|seq| seq.saturating_add(1000));
}
