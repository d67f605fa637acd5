use std::time::Duration;

use tracing::Span;

/// Default timeout of a single get query to one node.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
/// Default timeout of a single put request to one node.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
/// GetPut Configurations
pub struct Config {
    /// Timeout of each get query sent to a node during a traversal.
    ///
    /// Covers both the request and handing a valid item over to the reconciler,
    /// if the reconciler is busy past this timeout the item is dropped.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Timeout of each put request sent to a node during the write fan-out.
    ///
    /// Bounds how long an unresponsive node can hold up a put, on top of the
    /// caller's own [crate::QueryContext].
    ///
    /// Defaults to [DEFAULT_WRITE_TIMEOUT]
    pub write_timeout: Duration,
    /// Parent span for every event and task of a [crate::GetPut] client.
    ///
    /// Defaults to None, where a `getput` debug span is created on construction.
    pub span: Option<Span>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            span: None,
        }
    }
}
