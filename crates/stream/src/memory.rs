//! In-memory message log.
//!
//! Behaves like a single-stream durable log: every publish gets the next
//! log sequence, subscriptions replay from any sequence, and each
//! subscription numbers its deliveries from 1. Flow-control and heartbeat
//! status messages can be switched on, and delivery faults can be armed on
//! individual log sequences.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chunkrelay_protocol::Headers;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::{
    BoxFuture, DeliverFrom, LogMessage, MessageKind, MessageLog, PublishAck, Subscription,
    TransportError,
};

const FLOW_CONTROL_PREFIX: &str = "$FC";

/// Delivery fault applied to one log sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Flip every bit of the first payload byte.
    Corrupt,
    /// Skip the message. The consumer sequence still advances, leaving a gap.
    Drop,
    /// Deliver the message twice in a row.
    Duplicate,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLogOptions {
    /// Send a flow-control message after every `n` data deliveries and hold
    /// further deliveries until it is answered.
    pub flow_control_every: Option<u64>,
    /// Emit a heartbeat when a read has been idle this long.
    pub idle_heartbeat: Option<Duration>,
}

struct Stored {
    subject: String,
    headers: Headers,
    payload: Vec<u8>,
}

struct ArmedFault {
    fault: Fault,
    remaining: u32,
}

#[derive(Default)]
struct Inner {
    messages: Vec<Stored>,
    faults: HashMap<u64, ArmedFault>,
    pending_flow: HashSet<String>,
    acks: Vec<u64>,
    terms: Vec<u64>,
    flow_replies: Vec<String>,
    discarded_replies: usize,
    subscriptions: usize,
    open: usize,
}

impl Inner {
    fn take_fault(&mut self, seq: u64) -> Option<Fault> {
        let armed = self.faults.get_mut(&seq)?;
        let fault = armed.fault;
        armed.remaining = armed.remaining.saturating_sub(1);
        if armed.remaining == 0 {
            self.faults.remove(&seq);
        }
        Some(fault)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
    options: MemoryLogOptions,
}

/// Cloneable handle to an in-memory log.
#[derive(Clone)]
pub struct MemoryLog {
    shared: Arc<Shared>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::with_options(MemoryLogOptions::default())
    }

    pub fn with_options(options: MemoryLogOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                notify: Notify::new(),
                options,
            }),
        }
    }

    /// Arms `fault` for the next `times` deliveries of `stream_sequence`,
    /// across all subscriptions.
    pub async fn inject_fault(&self, stream_sequence: u64, fault: Fault, times: u32) {
        if times == 0 {
            return;
        }
        let mut inner = self.shared.inner.lock().await;
        inner.faults.insert(
            stream_sequence,
            ArmedFault {
                fault,
                remaining: times,
            },
        );
    }

    /// Log sequence of the most recent publish, 0 when empty.
    pub async fn last_sequence(&self) -> u64 {
        self.shared.inner.lock().await.messages.len() as u64
    }

    /// Log sequences acknowledged so far, in order.
    pub async fn acks(&self) -> Vec<u64> {
        self.shared.inner.lock().await.acks.clone()
    }

    /// Log sequences terminated so far, in order.
    pub async fn terms(&self) -> Vec<u64> {
        self.shared.inner.lock().await.terms.clone()
    }

    /// Flow-control reply addresses that were answered.
    pub async fn flow_replies(&self) -> Vec<String> {
        self.shared.inner.lock().await.flow_replies.clone()
    }

    /// Replies sent to addresses nobody was waiting on.
    pub async fn discarded_replies(&self) -> usize {
        self.shared.inner.lock().await.discarded_replies
    }

    pub async fn subscriptions_opened(&self) -> usize {
        self.shared.inner.lock().await.subscriptions
    }

    /// Subscriptions not yet unsubscribed.
    pub async fn open_subscriptions(&self) -> usize {
        self.shared.inner.lock().await.open
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog for MemoryLog {
    fn publish<'a>(
        &'a self,
        subject: &'a str,
        headers: Headers,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<PublishAck, TransportError>> {
        Box::pin(async move {
            let stream_sequence = {
                let mut inner = self.shared.inner.lock().await;
                inner.messages.push(Stored {
                    subject: subject.to_string(),
                    headers,
                    payload,
                });
                inner.messages.len() as u64
            };
            self.shared.notify.notify_waiters();
            debug!(subject, seq = stream_sequence, "published");
            Ok(PublishAck { stream_sequence })
        })
    }

    fn subscribe<'a>(
        &'a self,
        subject: &'a str,
        from: DeliverFrom,
    ) -> BoxFuture<'a, Result<Box<dyn Subscription>, TransportError>> {
        Box::pin(async move {
            {
                let mut inner = self.shared.inner.lock().await;
                inner.subscriptions += 1;
                inner.open += 1;
            }
            let cursor = match from {
                DeliverFrom::All => 1,
                DeliverFrom::Sequence(seq) => seq.max(1),
            };
            debug!(subject, from = cursor, "subscribed");
            let sub: Box<dyn Subscription> = Box::new(MemorySubscription {
                shared: Arc::clone(&self.shared),
                subject: subject.to_string(),
                cursor,
                consumer_seq: 0,
                since_flow: 0,
                awaiting_flow: None,
                duplicate: None,
                closed: false,
            });
            Ok(sub)
        })
    }

    fn reply<'a>(
        &'a self,
        reply_to: &'a str,
        _payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            {
                let mut inner = self.shared.inner.lock().await;
                if inner.pending_flow.remove(reply_to) {
                    inner.flow_replies.push(reply_to.to_string());
                } else {
                    inner.discarded_replies += 1;
                    debug!(reply_to, "discarding reply with no listener");
                }
            }
            self.shared.notify.notify_waiters();
            Ok(())
        })
    }
}

struct MemorySubscription {
    shared: Arc<Shared>,
    subject: String,
    /// Next log sequence to examine.
    cursor: u64,
    consumer_seq: u64,
    since_flow: u64,
    awaiting_flow: Option<String>,
    duplicate: Option<LogMessage>,
    closed: bool,
}

impl MemorySubscription {
    /// Next message deliverable right now, if any.
    fn poll_ready(&mut self, inner: &mut Inner) -> Option<LogMessage> {
        if let Some(reply) = &self.awaiting_flow {
            if inner.pending_flow.contains(reply) {
                return None;
            }
            self.awaiting_flow = None;
        }

        if let Some(mut dup) = self.duplicate.take() {
            self.consumer_seq += 1;
            dup.consumer_sequence = self.consumer_seq;
            self.since_flow += 1;
            return Some(dup);
        }

        if let Some(every) = self.shared.options.flow_control_every
            && every > 0
            && self.since_flow >= every
        {
            let reply = format!("{FLOW_CONTROL_PREFIX}.{}", uuid::Uuid::new_v4().simple());
            inner.pending_flow.insert(reply.clone());
            self.awaiting_flow = Some(reply.clone());
            self.since_flow = 0;
            return Some(LogMessage::status(
                &self.subject,
                MessageKind::FlowControl,
                Some(reply),
            ));
        }

        while self.cursor as usize <= inner.messages.len() {
            let seq = self.cursor;
            self.cursor += 1;
            let stored = &inner.messages[(seq - 1) as usize];
            if stored.subject != self.subject {
                continue;
            }
            let mut msg = LogMessage {
                subject: stored.subject.clone(),
                headers: stored.headers.clone(),
                payload: stored.payload.clone(),
                reply_to: None,
                kind: MessageKind::Data,
                stream_sequence: seq,
                consumer_sequence: 0,
            };
            self.consumer_seq += 1;
            msg.consumer_sequence = self.consumer_seq;

            match inner.take_fault(seq) {
                Some(Fault::Drop) => {
                    debug!(seq, "fault: dropping delivery");
                    continue;
                }
                Some(Fault::Corrupt) => {
                    debug!(seq, "fault: corrupting delivery");
                    if let Some(b) = msg.payload.first_mut() {
                        *b ^= 0xFF;
                    }
                }
                Some(Fault::Duplicate) => {
                    debug!(seq, "fault: duplicating delivery");
                    self.duplicate = Some(msg.clone());
                }
                None => {}
            }
            self.since_flow += 1;
            return Some(msg);
        }
        None
    }
}

impl Subscription for MemorySubscription {
    fn next_message(&mut self, timeout: Duration) -> BoxFuture<'_, Result<LogMessage, TransportError>> {
        Box::pin(async move {
            if self.closed {
                return Err(TransportError::Closed);
            }
            let now = Instant::now();
            let deadline = now + timeout;
            let wake_at = match self.shared.options.idle_heartbeat {
                Some(interval) if now + interval < deadline => now + interval,
                _ => deadline,
            };
            let shared = Arc::clone(&self.shared);

            loop {
                let notified = shared.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                {
                    let mut inner = shared.inner.lock().await;
                    if let Some(msg) = self.poll_ready(&mut inner) {
                        return Ok(msg);
                    }
                }

                if tokio::time::timeout_at(wake_at, notified).await.is_err() {
                    if wake_at < deadline {
                        return Ok(LogMessage::status(
                            &self.subject,
                            MessageKind::Heartbeat,
                            None,
                        ));
                    }
                    return Err(TransportError::Timeout);
                }
            }
        })
    }

    fn ack<'a>(&'a mut self, msg: &'a LogMessage) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            if self.closed {
                return Err(TransportError::Closed);
            }
            if msg.kind == MessageKind::Data {
                self.shared.inner.lock().await.acks.push(msg.stream_sequence);
            }
            Ok(())
        })
    }

    fn term<'a>(&'a mut self, msg: &'a LogMessage) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            if self.closed {
                return Err(TransportError::Closed);
            }
            if msg.kind == MessageKind::Data {
                self.shared.inner.lock().await.terms.push(msg.stream_sequence);
            }
            Ok(())
        })
    }

    fn unsubscribe(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            self.duplicate = None;
            let mut inner = self.shared.inner.lock().await;
            inner.open = inner.open.saturating_sub(1);
            if let Some(reply) = self.awaiting_flow.take() {
                inner.pending_flow.remove(&reply);
            }
            drop(inner);
            debug!(subject = %self.subject, "unsubscribed");
            Ok(())
        })
    }
}
