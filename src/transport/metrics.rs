//! Metrics for streamed answers
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.
//!
//! # Metrics
//!
//! - `raidscope_streams_opened_total`: Counter of streams opened
//! - `raidscope_stream_tokens_total`: Counter of text fragments delivered
//! - `raidscope_streams_finished_total`: Counter of finished streams by outcome
//! - `raidscope_stream_duration_seconds`: Histogram of stream lifetimes by outcome
//! - `raidscope_streams_active`: Gauge of streams currently open

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::time::Instant;

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Terminal `Complete` event delivered
    Complete,
    /// Terminal `Error` event delivered
    Error,
    /// Consumer cancelled before a terminal event
    Cancelled,
}

impl StreamOutcome {
    /// Label value used for the `outcome` metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamOutcome::Complete => "complete",
            StreamOutcome::Error => "error",
            StreamOutcome::Cancelled => "cancelled",
        }
    }
}

/// Metrics tracker for a single stream.
///
/// The outcome is recorded once; later calls to [`StreamMetrics::finish`]
/// are ignored.
#[derive(Debug)]
pub struct StreamMetrics {
    start: Instant,
    tokens: u64,
    recorded: bool,
}

impl StreamMetrics {
    /// Record a newly opened stream.
    pub fn start() -> Self {
        increment_counter!("raidscope_streams_opened_total");
        increment_gauge!("raidscope_streams_active", 1.0);

        Self {
            start: Instant::now(),
            tokens: 0,
            recorded: false,
        }
    }

    /// Record one delivered text fragment.
    pub fn record_token(&mut self) {
        self.tokens += 1;
        increment_counter!("raidscope_stream_tokens_total");
    }

    /// Number of fragments delivered so far.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Record how the stream ended.
    pub fn finish(&mut self, outcome: StreamOutcome) {
        if self.recorded {
            return;
        }
        self.recorded = true;

        histogram!(
            "raidscope_stream_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "outcome" => outcome.as_str()
        );
        increment_counter!(
            "raidscope_streams_finished_total",
            "outcome" => outcome.as_str()
        );
        decrement_gauge!("raidscope_streams_active", 1.0);

        tracing::debug!(
            outcome = outcome.as_str(),
            tokens = self.tokens,
            "Stream finished"
        );
    }

    /// Whether the outcome has been recorded.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }
}
