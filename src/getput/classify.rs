//! Decide whether a node's get reply carries an item valid for the queried target.

use crate::{
    common::{validate_immutable, Id, Item, MutableError, MutableItem},
    transport::GetReply,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Value hashes to the target.
    Immutable(Item),
    /// Public key and salt hash to the target, and the signature verifies.
    Mutable(Item),
    /// The reply carried a value that is valid for neither kind.
    Invalid(MalformedResponse),
    /// The reply carried no value.
    Empty,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Reasons a value returned by a node is discarded.
pub enum MalformedResponse {
    #[error("Value hash doesn't match the target, and no public key was returned")]
    MissingMutableFields,

    #[error("Neither the value nor the public key and salt hash to the target")]
    TargetMismatch,

    #[error(transparent)]
    Mutable(#[from] MutableError),
}

/// Classify a reply to a get query for `target`.
///
/// Pure, apart from the signature verification.
pub fn classify(reply: &GetReply, target: &Id, salt: Option<&[u8]>) -> Classification {
    let Some(v) = &reply.v else {
        return Classification::Empty;
    };

    if validate_immutable(v, target) {
        return Classification::Immutable(Item::Immutable(v.clone()));
    }

    let (Some(k), Some(seq), Some(sig)) = (&reply.k, reply.seq, &reply.sig) else {
        return Classification::Invalid(MalformedResponse::MissingMutableFields);
    };

    if MutableItem::target_from_key(k, salt) != *target {
        return Classification::Invalid(MalformedResponse::TargetMismatch);
    }

    match MutableItem::from_dht_message(*target, k, v, seq, sig, salt) {
        Ok(item) => Classification::Mutable(Item::Mutable(item)),
        Err(error) => Classification::Invalid(error.into()),
    }
}
