/// Errors surfaced by a message log or metadata store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No message arrived within the read window.
    #[error("timed out waiting for a message")]
    Timeout,

    /// The subscription was torn down.
    #[error("subscription closed")]
    Closed,

    #[error("transport failure: {0}")]
    Failed(String),
}

impl TransportError {
    /// Returns `true` for "no data yet", which callers treat as idle time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}
