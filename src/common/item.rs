//! Items stored at a target, and the write tokens needed to store them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};

use super::{hash_immutable, Id, MutableItem};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// A value stored in the DHT, either content addressed or signed by an author.
pub enum Item {
    /// Value whose target is its own sha1 hash, it can never be updated.
    Immutable(Bytes),
    /// Value whose target is derived from a public key and an optional salt.
    Mutable(MutableItem),
}

impl Item {
    /// Target this item is stored at.
    pub fn target(&self) -> Id {
        match self {
            Item::Immutable(value) => hash_immutable(value).into(),
            Item::Mutable(item) => *item.target(),
        }
    }

    pub fn value(&self) -> &[u8] {
        match self {
            Item::Immutable(value) => value.as_ref(),
            Item::Mutable(item) => item.value(),
        }
    }

    /// Sequence number, only mutable items have one.
    pub fn seq(&self) -> Option<i64> {
        match self {
            Item::Immutable(_) => None,
            Item::Mutable(item) => Some(item.seq()),
        }
    }

    pub fn is_mutable(&self) -> bool {
        matches!(self, Item::Mutable(_))
    }
}

impl From<MutableItem> for Item {
    fn from(item: MutableItem) -> Self {
        Item::Mutable(item)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// Opaque credential issued by a node in response to a get query.
///
/// It is only meaningful to the node that issued it, and only for a short while.
pub struct WriteToken(Bytes);

impl WriteToken {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        WriteToken(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for WriteToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "WriteToken(")?;
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}
