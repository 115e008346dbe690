use crate::common::Timestamp;
use crate::error::{Error, Result};
use crate::rtt::{RttSample, RttTracker, Statistics};
use serde::Serialize;

/// Requests sent and replies accepted during a session.
#[derive(Serialize, Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SessionCounters {
    sent: u64,
    received: u64,
}

impl SessionCounters {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sent: 0,
            received: 0,
        }
    }

    pub fn increment_sent(&mut self) {
        self.sent += 1;
    }

    pub fn increment_received(&mut self) {
        debug_assert!(self.received < self.sent, "more replies than requests");
        self.received += 1;
    }

    #[must_use]
    pub const fn sent(&self) -> u64 {
        self.sent
    }

    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// The percentage of requests without an accepted reply.
    #[must_use]
    pub fn loss_percentage(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        (1.0 - self.received as f64 / self.sent as f64) * 100.0
    }
}

/// The state of a single ping run, owned by the control loop.
#[derive(Debug, Default)]
pub struct Session {
    counters: SessionCounters,
    rtt: RttTracker,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_sent(&mut self) {
        self.counters.increment_sent();
    }

    /// Record the round trip of an echo reply addressed to this session.
    ///
    /// Replies beyond the number of requests sent (duplicates) are rejected.
    pub fn reply_received(&mut self, echo_reply: &[u8], now: Timestamp) -> Result<RttSample> {
        if self.counters.received() >= self.counters.sent() {
            return Err(Error::UnexpectedReply);
        }
        let sample = self.rtt.record_reply(echo_reply, now)?;
        self.counters.increment_received();
        Ok(sample)
    }

    #[must_use]
    pub const fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    #[must_use]
    pub const fn rtt(&self) -> &RttTracker {
        &self.rtt
    }

    /// A snapshot of the run so far.
    ///
    /// Statistics are only computed once a reply has been received.
    #[must_use]
    pub fn summary(&self, host: &str) -> Summary {
        let stats = if self.counters.received() > 0 {
            self.rtt.compute_statistics()
        } else {
            None
        };
        Summary {
            host: host.to_string(),
            sent: self.counters.sent(),
            received: self.counters.received(),
            loss_percentage: self.counters.loss_percentage(),
            stats,
        }
    }
}

/// The end of run report.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub host: String,
    pub sent: u64,
    pub received: u64,
    pub loss_percentage: f64,
    pub stats: Option<Statistics>,
}
