//! # Fill Metrics
//!
//! Counters a store updates as it settles cells. Every counter is atomic so
//! a store can be filled from several rayon workers while the controlling
//! thread reads progress.
//!
//! ```rust
//! use cfcache_core::observe::CacheMetrics;
//!
//! let metrics = CacheMetrics::new();
//! metrics.filled.inc();
//! metrics.fill_latency_us.observe(850.0);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.settled(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// A simple atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A histogram with fixed buckets.
#[derive(Debug)]
pub struct Histogram {
    /// Bucket upper bounds
    boundaries: Vec<f64>,
    /// Bucket counts (len = boundaries.len() + 1 for overflow bucket)
    buckets: Vec<AtomicU64>,
    /// Sum of observations, stored in thousandths
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::latency_us()
    }
}

impl Histogram {
    pub fn new(boundaries: Vec<f64>) -> Self {
        let num_buckets = boundaries.len() + 1;
        Self {
            boundaries,
            buckets: (0..num_buckets).map(|_| AtomicU64::new(0)).collect(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Buckets for per-kernel fill times, 100 µs to 10 s.
    pub fn latency_us() -> Self {
        Self::new(vec![
            100.0, 500.0, 1_000.0, 5_000.0, 10_000.0, 50_000.0, 100_000.0, 500_000.0,
            1_000_000.0, 10_000_000.0,
        ])
    }

    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&b| value < b)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.sum
            .fetch_add((value.max(0.0) * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }
}

/// Counters for one store.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Cells that settled as filled kernels (synthesized or derived)
    pub filled: Counter,
    /// Cells that settled as degenerate
    pub degenerate: Counter,
    /// Fills that returned an error and published nothing
    pub failed: Counter,
    /// Filled cells resampled from a conjugate channel
    pub derived: Counter,
    /// Cells restored from disk
    pub loaded: Counter,
    /// Wall time of each completed fill, microseconds
    pub fill_latency_us: Histogram,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            filled: self.filled.get(),
            degenerate: self.degenerate.get(),
            failed: self.failed.get(),
            derived: self.derived.get(),
            loaded: self.loaded.get(),
            fill_count: self.fill_latency_us.count(),
            fill_sum_us: self.fill_latency_us.sum(),
        }
    }

    /// Export in Prometheus text format, labelled with the store name.
    pub fn to_prometheus(&self, store: &str) -> String {
        let s = self.snapshot();
        let mut output = String::new();
        for (name, help, value) in [
            ("filled", "Cells settled as filled kernels", s.filled),
            ("degenerate", "Cells settled as degenerate", s.degenerate),
            ("failed", "Fills that published nothing", s.failed),
            ("derived", "Cells derived by conjugate reuse", s.derived),
            ("loaded", "Cells restored from disk", s.loaded),
        ] {
            output.push_str(&format!("# HELP cfcache_{}_total {}\n", name, help));
            output.push_str(&format!("# TYPE cfcache_{}_total counter\n", name));
            output.push_str(&format!(
                "cfcache_{}_total{{store=\"{}\"}} {}\n",
                name, store, value
            ));
        }
        output
    }
}

/// A snapshot of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheMetricsSnapshot {
    pub filled: u64,
    pub degenerate: u64,
    pub failed: u64,
    pub derived: u64,
    pub loaded: u64,
    pub fill_count: u64,
    pub fill_sum_us: f64,
}

impl CacheMetricsSnapshot {
    /// Cells that reached a final state through `fill`.
    pub fn settled(&self) -> u64 {
        self.filled + self.degenerate
    }

    pub fn avg_fill_us(&self) -> f64 {
        if self.fill_count == 0 {
            0.0
        } else {
            self.fill_sum_us / self.fill_count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.inc_by(41);
        assert_eq!(counter.get(), 42);
    }

    #[test]
    fn test_histogram() {
        let hist = Histogram::new(vec![10.0, 100.0]);
        hist.observe(5.0);
        hist.observe(50.0);
        hist.observe(500.0);
        assert_eq!(hist.count(), 3);
        assert!((hist.sum() - 555.0).abs() < 0.01);
        assert_eq!(hist.bucket_counts(), vec![1, 1, 1]);
    }

    #[test]
    fn test_snapshot_and_export() {
        let metrics = CacheMetrics::new();
        metrics.filled.inc_by(4);
        metrics.degenerate.inc();
        metrics.fill_latency_us.observe(200.0);
        metrics.fill_latency_us.observe(400.0);

        let s = metrics.snapshot();
        assert_eq!(s.settled(), 5);
        assert!((s.avg_fill_us() - 300.0).abs() < 0.01);

        let text = metrics.to_prometheus("weight");
        assert!(text.contains("cfcache_filled_total{store=\"weight\"} 4"));
        assert!(text.contains("# TYPE cfcache_degenerate_total counter"));
    }
}
