//! BEP44 get and put over a pluggable traversal engine and transport.

mod classify;
mod fetch;
mod put;
mod reconcile;

use std::sync::Arc;

use bytes::Bytes;
use ed25519_dalek::SigningKey;
use tracing::{debug, debug_span, Instrument, Span};

use crate::{
    common::{hash_immutable, Id, Item, MutableItem},
    traversal::{Operation, Traversal, TraversalStats},
    transport::Transport,
    Config, Error, QueryContext,
};

pub use classify::{classify, Classification, MalformedResponse};
pub use put::{PutResponse, WriteOutcome};

use fetch::{start_discovery, DiscoveryParams};
use put::PutParams;
use reconcile::reconcile;

#[derive(Debug, Clone)]
/// Result of a successful get.
pub struct GetResponse {
    /// The immutable item, or the mutable item with the highest sequence number.
    pub item: Item,
    /// Stats of the traversal.
    pub stats: TraversalStats,
}

#[derive(Debug)]
/// Get and put client.
///
/// Owns no state between calls: every operation runs its own traversal,
/// and everything it learns is discarded once it returns.
///
/// Operations spawn tasks, so they must run inside a Tokio runtime.
pub struct GetPut<T, E> {
    transport: Arc<T>,
    engine: E,
    config: Config,
    span: Span,
}

impl<T: Transport, E: Traversal> GetPut<T, E> {
    pub fn new(transport: T, engine: E) -> Self {
        Self::with_config(transport, engine, Config::default())
    }

    pub fn with_config(transport: T, engine: E, config: Config) -> Self {
        let span = config
            .span
            .clone()
            .unwrap_or_else(|| debug_span!("getput"));

        Self {
            transport: Arc::new(transport),
            engine,
            config,
            span,
        }
    }

    // === Getters ===

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // === Public Methods ===

    /// Find the item stored at `target`.
    ///
    /// Returns as soon as a node returns a valid immutable item. Otherwise the
    /// traversal runs until it stalls, and the valid mutable item with the
    /// highest sequence number wins, the latest to arrive on ties.
    ///
    /// If `seq` is set, nodes only return mutable items more recent than it.
    /// `salt` is needed to verify mutable items stored with one.
    ///
    /// Traversal stats are only returned with a found item, on failure they
    /// are logged at debug level.
    pub async fn get(
        &self,
        ctx: &QueryContext,
        target: Id,
        seq: Option<i64>,
        salt: Option<&[u8]>,
    ) -> Result<GetResponse, Error> {
        let salt = salt.map(Bytes::copy_from_slice);

        async {
            let discovery = start_discovery(
                ctx,
                &self.transport,
                &self.engine,
                DiscoveryParams {
                    target,
                    seq,
                    salt,
                    request_timeout: self.config.request_timeout,
                },
            );

            let result = reconcile(
                &discovery.candidates,
                &discovery.operation.stalled(),
                ctx,
            )
            .await;
            discovery.stop();

            let stats = discovery.operation.stats();

            match result {
                Ok(item) => {
                    debug!(?target, ?stats, seq = ?item.seq(), "Get done");

                    Ok(GetResponse { item, stats })
                }
                Err(error) => {
                    debug!(?target, ?stats, ?error, "Get failed");

                    Err(error)
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Store an item at `target`.
    ///
    /// Runs a discovery first to learn the highest sequence number currently
    /// stored (0 if there is none) and the closest nodes with their write
    /// tokens, then calls `builder` with that sequence number and writes the
    /// item it returns to all those nodes concurrently.
    ///
    /// Fails only if `ctx` is done during discovery. Failed writes are logged
    /// and reported in [PutResponse], never raised.
    pub async fn put<F>(
        &self,
        ctx: &QueryContext,
        target: Id,
        salt: Option<&[u8]>,
        builder: F,
    ) -> Result<PutResponse, Error>
    where
        F: FnOnce(i64) -> Item,
    {
        let params = PutParams {
            target,
            salt: salt.map(Bytes::copy_from_slice),
            request_timeout: self.config.request_timeout,
            write_timeout: self.config.write_timeout,
        };

        async {
            let result = put::put(ctx, &self.transport, &self.engine, params, builder).await;

            match &result {
                Ok(response) => debug!(
                    ?target,
                    stats = ?response.stats(),
                    stored_at = response.stored_at().len(),
                    failed = response.failures().len(),
                    "Put done"
                ),
                Err(error) => debug!(?target, ?error, "Put failed"),
            }

            result
        }
        .instrument(self.span.clone())
        .await
    }

    // === Immutable data ===

    /// Get an immutable value by its sha1 hash.
    pub async fn get_immutable(&self, ctx: &QueryContext, target: Id) -> Result<Bytes, Error> {
        match self.get(ctx, target, None, None).await?.item {
            Item::Immutable(value) => Ok(value),
            Item::Mutable(_) => Err(Error::NotFound),
        }
    }

    /// Put an immutable value, stored at its sha1 hash.
    pub async fn put_immutable(
        &self,
        ctx: &QueryContext,
        value: &[u8],
    ) -> Result<PutResponse, Error> {
        let target: Id = hash_immutable(value).into();

        self.put(ctx, target, None, |_| {
            Item::Immutable(Bytes::copy_from_slice(value))
        })
        .await
    }

    // === Mutable data ===

    /// Get the most recent mutable item for a public key and optional salt.
    pub async fn get_mutable(
        &self,
        ctx: &QueryContext,
        public_key: &[u8; 32],
        salt: Option<&[u8]>,
        seq: Option<i64>,
    ) -> Result<MutableItem, Error> {
        let target = MutableItem::target_from_key(public_key, salt);

        match self.get(ctx, target, seq, salt).await?.item {
            Item::Mutable(item) => Ok(item),
            Item::Immutable(_) => Err(Error::NotFound),
        }
    }

    /// Sign `value` with the sequence number following the most recent one
    /// found, and put it.
    pub async fn put_mutable(
        &self,
        ctx: &QueryContext,
        signer: &SigningKey,
        value: &[u8],
        salt: Option<&[u8]>,
    ) -> Result<PutResponse, Error> {
        let target = MutableItem::target_from_key(signer.verifying_key().as_bytes(), salt);

        self.put(ctx, target, salt, |seq| {
            MutableItem::new(signer, value, seq.saturating_add(1), salt).into()
        })
        .await
    }
}
