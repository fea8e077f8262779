//! Transport seams for chunkrelay.
//!
//! [`MessageLog`], [`Subscription`], and [`MetaStore`] are implemented by
//! whatever carries the bytes. Keeping them as traits lets the relay run
//! against the in-memory implementations in [`memory`] and [`store`] in
//! tests and in the loopback binary.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chunkrelay_protocol::Headers;

mod error;
pub mod memory;
mod message;
pub mod store;

pub use error::TransportError;
pub use memory::{Fault, MemoryLog, MemoryLogOptions};
pub use message::{LogMessage, MessageKind, PublishAck};
pub use store::MemoryMetaStore;

/// Boxed future returned by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where a new subscription starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverFrom {
    /// From the first message on the subject.
    All,
    /// From the first message on the subject at or after this log sequence.
    Sequence(u64),
}

/// Ordered, durable, at-least-once message log.
pub trait MessageLog: Send + Sync {
    /// Appends a message to `subject` and returns its log sequence.
    fn publish<'a>(
        &'a self,
        subject: &'a str,
        headers: Headers,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<PublishAck, TransportError>>;

    /// Opens an ordered subscription on `subject`.
    fn subscribe<'a>(
        &'a self,
        subject: &'a str,
        from: DeliverFrom,
    ) -> BoxFuture<'a, Result<Box<dyn Subscription>, TransportError>>;

    /// Sends `payload` to a reply address. Replies to addresses nobody is
    /// waiting on are dropped.
    fn reply<'a>(
        &'a self,
        reply_to: &'a str,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// One consumer's view of a subject.
pub trait Subscription: Send {
    /// Waits up to `timeout` for the next message.
    ///
    /// Returns [`TransportError::Timeout`] when nothing arrived in time.
    fn next_message(&mut self, timeout: Duration) -> BoxFuture<'_, Result<LogMessage, TransportError>>;

    /// Acknowledges a data message.
    fn ack<'a>(&'a mut self, msg: &'a LogMessage) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Tells the log not to redeliver `msg` on this subscription.
    fn term<'a>(&'a mut self, msg: &'a LogMessage) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Tears the subscription down. Later reads return [`TransportError::Closed`].
    fn unsubscribe(&mut self) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// Key/value store for whole-file records.
pub trait MetaStore: Send + Sync {
    /// Stores `value` under `key` and returns the new revision.
    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<u64, TransportError>>;

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, TransportError>>;

    /// All keys currently stored.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, TransportError>>;
}
