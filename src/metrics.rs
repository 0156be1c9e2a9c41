//! Fetch metrics collection and reporting
//!
//! Tracks latency percentiles and outcomes of feed fetch attempts.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Point-in-time view of the fetch metrics
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMetrics {
    /// Name of the market source
    pub source_name: String,
    /// 50th percentile latency of successful attempts in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful attempts in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate over the lifetime of the feed (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of attempts
    pub total_requests: u64,
    /// Number of failed attempts
    pub failed_requests: u64,
    /// Failures since the last success
    pub consecutive_failures: u64,
}

impl FetchMetrics {
    /// Creates metrics with no data
    pub fn empty(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Window {
    samples: VecDeque<Sample>,
    total: u64,
    failed: u64,
    consecutive_failures: u64,
}

/// Collects fetch outcomes for one feed
pub struct MetricsCollector {
    source_name: String,
    window: Mutex<Window>,
}

impl MetricsCollector {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            window: Mutex::new(Window {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                ..Window::default()
            }),
        }
    }

    /// Records one attempt with its duration and outcome
    pub async fn record(&self, duration: Duration, success: bool) {
        let mut window = self.window.lock().await;
        window.total += 1;
        if success {
            window.consecutive_failures = 0;
        } else {
            window.failed += 1;
            window.consecutive_failures += 1;
        }

        if window.samples.len() >= MAX_SAMPLES {
            window.samples.pop_front();
        }
        window.samples.push_back(Sample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn snapshot(&self) -> FetchMetrics {
        let window = self.window.lock().await;
        if window.total == 0 {
            return FetchMetrics::empty(&self.source_name);
        }

        let mut latencies: Vec<f64> = window
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        FetchMetrics {
            source_name: self.source_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate: (window.total - window.failed) as f64 / window.total as f64,
            total_requests: window.total,
            failed_requests: window.failed,
            consecutive_failures: window.consecutive_failures,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
