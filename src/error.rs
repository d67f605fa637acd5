//! Main Crate Error

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors surfaced by [crate::GetPut] operations.
///
/// Anomalies from individual nodes (bad values, failed writes) are logged and
/// absorbed, they never show up here.
pub enum Error {
    /// The traversal stalled before any node returned a valid item.
    #[error("value not found")]
    NotFound,

    /// The caller's [crate::QueryContext] was canceled.
    #[error("operation canceled")]
    Canceled,

    /// The caller's [crate::QueryContext] deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}
