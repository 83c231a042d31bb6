//! Request and latency statistics for the prediction service.

use crate::types::emission::EmissionCategory;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept for percentile calculation
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the prediction endpoint
pub struct PipelineMetrics {
    /// Successful predictions
    pub predictions_served: AtomicU64,
    /// Requests rejected as invalid input
    pub predictions_rejected: AtomicU64,
    /// Requests that failed inside the pipeline or hit an unloaded service
    pub predictions_failed: AtomicU64,
    /// Served predictions by emission category
    by_category: RwLock<HashMap<EmissionCategory, u64>>,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            predictions_rejected: AtomicU64::new(0),
            predictions_failed: AtomicU64::new(0),
            by_category: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a served prediction
    pub fn record_prediction(&self, latency: Duration, category: EmissionCategory) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }

        if let Ok(mut by_category) = self.by_category.write() {
            *by_category.entry(category).or_insert(0) += 1;
        }
    }

    /// Record a request rejected as invalid input
    pub fn record_rejected(&self) {
        self.predictions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed prediction
    pub fn record_failure(&self) {
        self.predictions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get latency statistics over the sample window
    pub fn get_latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(times) => times.clone(),
            Err(_) => return LatencyStats::default(),
        };
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get served predictions per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get served predictions by category label
    pub fn get_category_counts(&self) -> HashMap<String, u64> {
        self.by_category
            .read()
            .map(|by_category| {
                by_category
                    .iter()
                    .map(|(category, count)| (category.label().to_string(), *count))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Point-in-time copy of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            predictions_rejected: self.predictions_rejected.load(Ordering::Relaxed),
            predictions_failed: self.predictions_failed.load(Ordering::Relaxed),
            throughput_per_sec: self.get_throughput(),
            latency: self.get_latency_stats(),
            categories: self.get_category_counts(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let latency = &snapshot.latency;

        info!(
            served = snapshot.predictions_served,
            rejected = snapshot.predictions_rejected,
            failed = snapshot.predictions_failed,
            throughput = format!("{:.2} req/s", snapshot.throughput_per_sec),
            "Prediction metrics summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction latency"
        );
        for (category, count) in &snapshot.categories {
            info!(category = %category, count = count, "Predictions by category");
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable view of the metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub predictions_served: u64,
    pub predictions_rejected: u64,
    pub predictions_failed: u64,
    pub throughput_per_sec: f64,
    pub latency: LatencyStats,
    pub categories: HashMap<String, u64>,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
