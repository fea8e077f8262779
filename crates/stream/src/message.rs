use chunkrelay_protocol::Headers;

/// What a delivered message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A published message.
    Data,
    /// Backpressure status message; the subscriber must reply on `reply_to`.
    FlowControl,
    /// Idle heartbeat status message; carries nothing.
    Heartbeat,
}

/// A message as delivered to one subscription.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub subject: String,
    pub headers: Headers,
    pub payload: Vec<u8>,
    pub reply_to: Option<String>,
    pub kind: MessageKind,
    /// Log-wide sequence assigned at publish time. 0 for status messages.
    pub stream_sequence: u64,
    /// Per-subscription delivery counter, starting at 1. 0 for status messages.
    pub consumer_sequence: u64,
}

impl LogMessage {
    pub fn is_flow_control(&self) -> bool {
        self.kind == MessageKind::FlowControl
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind == MessageKind::Heartbeat
    }

    pub(crate) fn status(subject: &str, kind: MessageKind, reply_to: Option<String>) -> Self {
        Self {
            subject: subject.to_string(),
            headers: Headers::new(),
            payload: Vec::new(),
            reply_to,
            kind,
            stream_sequence: 0,
            consumer_sequence: 0,
        }
    }
}

/// Acknowledgement returned by a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    pub stream_sequence: u64,
}
