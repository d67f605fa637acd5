//! Pick the authoritative item among everything a discovery turns up.

use tracing::{debug, trace};

use crate::{common::Item, traversal::Signal, Error, QueryContext};

/// Outcome of feeding one candidate to a [SequenceReconciler].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step<'a> {
    /// An immutable item, nothing can supersede it.
    Resolved(Item),
    /// A mutable item was seen, carries the best mutable item so far.
    Update(&'a Item),
}

#[derive(Debug)]
/// Tracks the mutable item with the highest sequence number seen so far.
pub(crate) struct SequenceReconciler {
    best: Option<Item>,
    best_seq: i64,
}

impl SequenceReconciler {
    pub fn new() -> Self {
        Self {
            best: None,
            best_seq: i64::MIN,
        }
    }

    /// Later candidates with an equal sequence number replace earlier ones.
    pub fn step(&mut self, candidate: Item) -> Step<'_> {
        match candidate.seq() {
            None => Step::Resolved(candidate),
            Some(seq) => {
                let best = match self.best.take() {
                    Some(best) if seq < self.best_seq => best,
                    _ => {
                        self.best_seq = seq;
                        candidate
                    }
                };

                Step::Update(&*self.best.insert(best))
            }
        }
    }

    pub fn finish(self) -> Result<Item, Error> {
        self.best.ok_or(Error::NotFound)
    }
}

/// Consume candidates until an immutable item shows up, the traversal stalls,
/// or `ctx` is done.
///
/// Cancellation wins over everything else, discarding any partial result.
pub(crate) async fn reconcile(
    candidates: &flume::Receiver<Item>,
    stalled: &Signal,
    ctx: &QueryContext,
) -> Result<Item, Error> {
    let mut reconciler = SequenceReconciler::new();

    loop {
        tokio::select! {
            biased;
            reason = ctx.done() => return Err(reason),
            candidate = candidates.recv_async() => match candidate {
                Ok(candidate) => {
                    debug!(?candidate, "Received candidate");

                    match reconciler.step(candidate) {
                        Step::Resolved(item) => return Ok(item),
                        Step::Update(best) => {
                            trace!(best_seq = ?best.seq(), "Tracking mutable item")
                        }
                    }
                }
                // Every query is gone, same as a stall.
                Err(_) => break,
            },
            _ = stalled.fired() => break,
        }
    }

    reconciler.finish()
}

/// Consume candidates until the traversal stalls, returning the highest
/// sequence number among mutable items, or 0 if there was none.
pub(crate) async fn max_seq(
    candidates: &flume::Receiver<Item>,
    stalled: &Signal,
    ctx: &QueryContext,
) -> Result<i64, Error> {
    let mut highest = 0;

    loop {
        tokio::select! {
            biased;
            reason = ctx.done() => return Err(reason),
            candidate = candidates.recv_async() => match candidate {
                Ok(candidate) => {
                    if let Some(seq) = candidate.seq() {
                        highest = highest.max(seq);
                    }
                }
                Err(_) => break,
            },
            _ = stalled.fired() => break,
        }
    }

    Ok(highest)
}
