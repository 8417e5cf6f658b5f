//! Session metrics: query latency, resets and delivered examples.

use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of a [`MetricsCollector`], as served on `/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub total_resets: u64,
    pub failed_resets: u64,
    pub total_delivered: u64,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p95_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

/// Counters for one served session.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    query_latencies_us: Vec<f64>,
    total_resets: u64,
    failed_resets: u64,
    total_delivered: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the end-to-end time of one query (embed, search and join).
    pub fn record_query(&mut self, duration: Duration) {
        self.query_latencies_us.push(duration.as_micros() as f64);
    }

    pub fn record_reset(&mut self) {
        self.total_resets += 1;
    }

    /// A reset that was rejected or failed; the old stream stayed in place.
    pub fn record_failed_reset(&mut self) {
        self.failed_resets += 1;
    }

    pub fn record_delivery(&mut self) {
        self.total_delivered += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut sorted = self.query_latencies_us.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let avg = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };

        MetricsSnapshot {
            total_queries: sorted.len() as u64,
            total_resets: self.total_resets,
            failed_resets: self.failed_resets,
            total_delivered: self.total_delivered,
            avg_query_latency_us: avg,
            p50_query_latency_us: percentile(&sorted, 50.0),
            p95_query_latency_us: percentile(&sorted, 95.0),
            p99_query_latency_us: percentile(&sorted, 99.0),
        }
    }
}

/// Nearest-rank percentile of an ascending slice; 0.0 when empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
