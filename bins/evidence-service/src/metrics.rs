//! Prometheus metrics for the ingestion pipeline.

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

use crate::error::{Result, ServiceError};

/// Shared metrics handle backed by a Prometheus registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    pub uploads_initiated: IntCounter,
    pub uploads_completed: IntCounter,
    pub uploads_failed: IntCounter,
    pub dedup_hits: IntCounter,
    pub pin_failures: IntCounter,
    pub downloads: IntCounter,
    pub hash_duration: Histogram,
}

impl Metrics {
    /// Creates a metrics handle with a fresh registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let uploads_initiated = IntCounter::new(
            "evidence_uploads_initiated_total",
            "Upload sessions created",
        )
        .expect("static metric definition");
        let uploads_completed = IntCounter::new(
            "evidence_uploads_completed_total",
            "Upload sessions completed",
        )
        .expect("static metric definition");
        let uploads_failed = IntCounter::new(
            "evidence_uploads_failed_total",
            "Upload completions that failed",
        )
        .expect("static metric definition");
        let dedup_hits = IntCounter::new(
            "evidence_dedup_hits_total",
            "Completions resolved against an existing artifact",
        )
        .expect("static metric definition");
        let pin_failures = IntCounter::new(
            "evidence_pin_failures_total",
            "Secondary-replica pin attempts that failed",
        )
        .expect("static metric definition");
        let downloads = IntCounter::new(
            "evidence_downloads_total",
            "Presigned download URLs issued",
        )
        .expect("static metric definition");
        let hash_duration = Histogram::with_opts(HistogramOpts::new(
            "evidence_hash_duration_seconds",
            "Time spent streaming objects through the digest engine",
        ))
        .expect("static metric definition");

        for collector in [
            Box::new(uploads_initiated.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(uploads_completed.clone()),
            Box::new(uploads_failed.clone()),
            Box::new(dedup_hits.clone()),
            Box::new(pin_failures.clone()),
            Box::new(downloads.clone()),
            Box::new(hash_duration.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric names are unique within the registry");
        }

        Self {
            registry,
            uploads_initiated,
            uploads_completed,
            uploads_failed,
            dedup_hits,
            pin_failures,
            downloads,
            hash_duration,
        }
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        use prometheus::Encoder;

        let mut buffer = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ServiceError::Internal(format!("metrics encoding: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| ServiceError::Internal(format!("metrics encoding produced invalid UTF-8: {}", e)))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero_and_render() {
        let metrics = Metrics::new();
        assert_eq!(metrics.dedup_hits.get(), 0);

        metrics.uploads_initiated.inc();
        let text = metrics.render().unwrap();
        assert!(text.contains("evidence_uploads_initiated_total 1"));
        assert!(text.contains("evidence_hash_duration_seconds"));
    }
}
