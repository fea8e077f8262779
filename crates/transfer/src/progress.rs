use std::time::{Duration, Instant};

struct Sample {
    bytes: u64,
    timestamp: Instant,
}

/// Transfer rate over a sliding window of samples.
pub struct ThroughputMeter {
    samples: Vec<Sample>,
    max_samples: usize,
    window_size: Duration,
    total_bytes: u64,
}

impl ThroughputMeter {
    /// Creates a meter.
    ///
    /// - `window_size`: time window for the rate (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: Vec::new(),
            max_samples: max_samples.unwrap_or(100),
            window_size: window_size.unwrap_or(Duration::from_secs(5)),
            total_bytes: 0,
        }
    }

    /// Records `bytes` transferred now.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(bytes, Instant::now());
    }

    fn record_at(&mut self, bytes: u64, now: Instant) {
        self.total_bytes += bytes;
        self.samples.push(Sample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(self.window_size) {
            self.samples.retain(|s| s.timestamp >= cutoff);
        }
        if self.samples.len() > self.max_samples {
            let excess = self.samples.len() - self.max_samples;
            self.samples.drain(..excess);
        }
    }

    /// Average rate within the window. 0.0 with fewer than two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) else {
            return 0.0;
        };
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if self.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        let bytes: u64 = self.samples.iter().map(|s| s.bytes).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to move `remaining_bytes`, `None` while the rate is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / rate))
    }

    /// Bytes recorded since creation or the last reset.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.total_bytes = 0;
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(None, None)
    }
}
