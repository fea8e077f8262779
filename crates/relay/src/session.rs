//! Download session state.
//!
//! A session tracks where the downloader is in the part stream and how
//! many resubscriptions it may still spend. It is owned by one download
//! loop and never shared.

use chunkrelay_stream::DeliverFrom;

/// Download lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Reading,
    Recovering,
    Done,
    Failed,
}

/// A per-part problem that triggers recovery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum Anomaly {
    #[error("delivery {actual} out of order, expected {expected}")]
    Sequence { expected: u64, actual: u64 },

    #[error("part {actual} out of order, expected {expected}")]
    Part { expected: u64, actual: u64 },

    #[error("part {part} is {actual} bytes, expected {expected}")]
    Length { part: u64, expected: u64, actual: u64 },

    #[error("part {part} starts at {actual}, expected {expected}")]
    Offset { part: u64, expected: u64, actual: u64 },

    #[error("part {part} payload is {actual} bytes, header says {expected}")]
    Payload { part: u64, expected: u64, actual: u64 },

    #[error("part {part} digest mismatch")]
    Digest { part: u64 },

    #[error("part {part} could not be decoded: {reason}")]
    Decode { part: u64, reason: String },

    #[error("malformed part: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub struct TransferSession {
    state: SessionState,
    /// Next delivery number expected on the current subscription.
    expecting: u64,
    /// Offset from `expecting` to the logical part number.
    adjustment: u64,
    retries_left: u32,
    recoveries: u32,
    /// Where the first subscription started.
    origin: DeliverFrom,
    first_sequence: Option<u64>,
    last_sequence: Option<u64>,
    parts_written: u64,
    bytes_written: u64,
}

impl TransferSession {
    pub fn new(retry_budget: u32) -> Self {
        Self {
            state: SessionState::Starting,
            expecting: 1,
            adjustment: 0,
            retries_left: retry_budget,
            recoveries: 0,
            origin: DeliverFrom::All,
            first_sequence: None,
            last_sequence: None,
            parts_written: 0,
            bytes_written: 0,
        }
    }

    /// Starts reading at `origin` instead of the beginning of the subject.
    pub fn with_origin(mut self, origin: DeliverFrom) -> Self {
        self.origin = origin;
        self
    }

    pub fn origin(&self) -> DeliverFrom {
        self.origin
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn expecting(&self) -> u64 {
        self.expecting
    }

    pub fn adjustment(&self) -> u64 {
        self.adjustment
    }

    /// Logical part number that must come next.
    pub fn expected_part(&self) -> u64 {
        self.expecting + self.adjustment
    }

    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    pub fn parts_written(&self) -> u64 {
        self.parts_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn first_sequence(&self) -> Option<u64> {
        self.first_sequence
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn is_complete(&self, total_parts: u64) -> bool {
        self.parts_written >= total_parts
    }

    /// Subscribed; messages may now be checked.
    pub fn start_reading(&mut self) {
        self.state = SessionState::Reading;
    }

    /// Checks delivery order, then logical part order.
    pub(crate) fn check_order(&self, consumer_sequence: u64, part_number: u64) -> Result<(), Anomaly> {
        if consumer_sequence != self.expecting {
            return Err(Anomaly::Sequence {
                expected: self.expecting,
                actual: consumer_sequence,
            });
        }
        if part_number != self.expected_part() {
            return Err(Anomaly::Part {
                expected: self.expected_part(),
                actual: part_number,
            });
        }
        Ok(())
    }

    /// Records an accepted part delivered at `stream_sequence`.
    pub fn accept(&mut self, stream_sequence: u64, bytes: u64) {
        self.expecting += 1;
        self.parts_written += 1;
        self.bytes_written += bytes;
        self.first_sequence.get_or_insert(stream_sequence);
        self.last_sequence = Some(stream_sequence);
    }

    /// Spends one retry and returns where to resubscribe.
    ///
    /// Returns `None` and moves to `Failed` once the budget is exhausted.
    /// On success the session is `Recovering` until
    /// [`start_reading`](Self::start_reading) is called on the new
    /// subscription.
    pub fn recover(&mut self) -> Option<DeliverFrom> {
        self.state = SessionState::Recovering;
        if self.retries_left == 0 {
            self.state = SessionState::Failed;
            return None;
        }
        self.retries_left -= 1;
        self.recoveries += 1;
        self.adjustment = self.expected_part() - 1;
        self.expecting = 1;
        Some(self.resume_from())
    }

    /// Position just after the last accepted part, or the origin if no
    /// part was accepted yet.
    pub fn resume_from(&self) -> DeliverFrom {
        match self.last_sequence {
            Some(seq) => DeliverFrom::Sequence(seq + 1),
            None => self.origin,
        }
    }

    pub fn finish(&mut self) {
        self.state = SessionState::Done;
    }

    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
    }
}
