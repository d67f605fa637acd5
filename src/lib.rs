//! # Mainline GetPut
//!
//! [BEP_0044](https://www.bittorrent.org/beps/bep_0044.html) `get` and `put` for
//! immutable and mutable items, on top of any node discovery engine.
//!
//! The heavy lifting of finding nodes close to a target is delegated to a
//! [traversal::Traversal] engine, and talking to nodes to a
//! [transport::Transport]. This crate decides which of the many, concurrently
//! arriving and possibly malicious, replies is authoritative, and coordinates
//! writing a new item to the closest nodes using the tokens they issued.
//!
//! ```no_run
//! # async fn run() -> Result<(), mainline_getput::Error> {
//! use mainline_getput::{testnet::Testnet, QueryContext};
//!
//! let testnet = Testnet::new(50);
//! let client = testnet.client();
//! let ctx = QueryContext::new();
//!
//! let put = client.put_immutable(&ctx, b"Hello World!").await?;
//! let value = client.get_immutable(&ctx, put.target()).await?;
//!
//! assert_eq!(&value[..], b"Hello World!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

mod common;
mod config;
mod context;
mod error;
mod getput;
#[cfg(feature = "testnet")]
pub mod testnet;
pub mod transport;
pub mod traversal;

pub use crate::common::{
    hash_immutable, validate_immutable, ClosestNodes, DecodeIdError, Id, InvalidIdSize, Item,
    MutableError, MutableItem, Node, WriteToken, ID_SIZE,
};
pub use bytes::Bytes;
pub use config::{Config, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
pub use context::QueryContext;
pub use error::Error;
pub use getput::{
    classify, Classification, GetPut, GetResponse, MalformedResponse, PutResponse, WriteOutcome,
};

pub use ed25519_dalek::SigningKey;
pub use tokio_util::sync::CancellationToken;
