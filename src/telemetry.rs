//! Latency and throughput telemetry for one generation.
//!
//! A [`StreamSession`] is created at dispatch and consumed at completion or
//! failure, so no timing state outlives its request. All timestamps are
//! passed in by the caller; the session never reads the clock itself.
//!
//! Token counts here are arrival-event counts, not tokenizer counts.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::inference::types::UsageMetrics;

/// Timing summary of one invocation. Replaced wholesale by the next one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Dispatch to first non-blank token. 0 when no such token arrived.
    pub ttft_ms: f64,
    /// Mean inter-arrival time. Absent with fewer than two tokens.
    pub avg_tpot_ms: Option<f64>,
    pub total_latency_ms: f64,
    pub total_tokens: u32,
    /// Absent when the latency is not positive, and for unary calls.
    pub tokens_per_second: Option<f64>,
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Metrics for a unary call. TTFT equals the full round trip.
pub fn unary_metrics(
    dispatched_at: Instant,
    received_at: Instant,
    usage: Option<&UsageMetrics>,
) -> PerformanceMetrics {
    let elapsed = millis(received_at.saturating_duration_since(dispatched_at));
    PerformanceMetrics {
        ttft_ms: elapsed,
        avg_tpot_ms: None,
        total_latency_ms: elapsed,
        total_tokens: usage.map(|u| u.completion_tokens).unwrap_or(0),
        tokens_per_second: None,
    }
}

// ─── Stream session ──────────────────────────────────────────────────────────

/// Where a session is in its lifecycle. `Idle` is the absence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Dispatched,
    Receiving,
}

/// Per-request aggregation of streamed tokens.
#[derive(Debug, Clone)]
pub struct StreamSession {
    dispatched_at: Instant,
    first_token_at: Option<Instant>,
    token_times: Vec<Instant>,
    text: String,
    reasoning: String,
}

impl StreamSession {
    /// Start a session at dispatch time `at`.
    pub fn dispatch(at: Instant) -> Self {
        Self {
            dispatched_at: at,
            first_token_at: None,
            token_times: Vec::new(),
            text: String::new(),
            reasoning: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.token_times.is_empty() {
            SessionState::Dispatched
        } else {
            SessionState::Receiving
        }
    }

    /// Record one answer-token arrival. Whitespace-only tokens count toward
    /// totals and throughput but cannot mark the first token. Text is kept
    /// verbatim.
    pub fn record_token(&mut self, text: &str, at: Instant) {
        self.token_times.push(at);
        if self.first_token_at.is_none() && !text.trim().is_empty() {
            self.first_token_at = Some(at);
        }
        self.text.push_str(text);
    }

    /// Record deliberation text. Not a token: no timing effect.
    pub fn record_reasoning(&mut self, text: &str) {
        self.reasoning.push_str(text);
    }

    /// Accumulated answer text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Accumulated deliberation text so far.
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn token_count(&self) -> usize {
        self.token_times.len()
    }

    /// TTFT as soon as the first non-blank token has arrived.
    pub fn ttft_ms(&self) -> Option<f64> {
        self.first_token_at
            .map(|t| millis(t.saturating_duration_since(self.dispatched_at)))
    }

    /// Close the session successfully at `end`.
    pub fn complete(self, end: Instant) -> CompletedSession {
        let total_latency_ms = millis(end.saturating_duration_since(self.dispatched_at));
        let total_tokens = self.token_times.len();

        let avg_tpot_ms = if total_tokens >= 2 {
            let sum: f64 = self
                .token_times
                .windows(2)
                .map(|pair| millis(pair[1].saturating_duration_since(pair[0])))
                .sum();
            Some(sum / (total_tokens - 1) as f64)
        } else {
            None
        };

        let tokens_per_second = if total_latency_ms > 0.0 {
            Some(total_tokens as f64 / total_latency_ms * 1000.0)
        } else {
            None
        };

        let metrics = PerformanceMetrics {
            ttft_ms: self.ttft_ms().unwrap_or(0.0),
            avg_tpot_ms,
            total_latency_ms,
            total_tokens: u32::try_from(total_tokens).unwrap_or(u32::MAX),
            tokens_per_second,
        };

        CompletedSession {
            text: self.text,
            reasoning: self.reasoning,
            metrics,
        }
    }

    /// Close the session on error. Metrics are discarded; the partial text
    /// is returned so it can stay visible.
    pub fn fail(self) -> String {
        self.text
    }
}

/// Output of a successfully completed stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    pub text: String,
    pub reasoning: String,
    pub metrics: PerformanceMetrics,
}
