//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for LexMask:
//! - Request counts and latency per endpoint
//! - Entities detected per label and detector
//! - Detector call latency and failures
//! - The active detector ladder rung

use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for LexMask
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Total requests received
    pub requests_total: CounterVec,
    /// Failed requests
    pub requests_failure: CounterVec,
    /// End-to-end request duration
    pub request_duration_seconds: HistogramVec,

    /// Entities reported to callers
    pub entities_detected_total: CounterVec,

    /// Detector calls that failed and were treated as empty
    pub detector_failures_total: CounterVec,
    /// Detector call duration
    pub detector_duration_seconds: HistogramVec,

    /// Active ladder rung (0=model with patterns, 1=linguistic, 2=patterns only)
    pub ladder_mode: Gauge,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("lexmask_requests_total", "Total number of requests"),
            &["endpoint"],
        )?;

        let requests_failure = CounterVec::new(
            Opts::new(
                "lexmask_requests_failure_total",
                "Total number of failed requests",
            ),
            &["endpoint", "error_type"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lexmask_request_duration_seconds",
                "Request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["endpoint"],
        )?;

        let entities_detected_total = CounterVec::new(
            Opts::new(
                "lexmask_entities_detected_total",
                "Total number of entities detected",
            ),
            &["label", "source"],
        )?;

        let detector_failures_total = CounterVec::new(
            Opts::new(
                "lexmask_detector_failures_total",
                "Detector calls that failed and contributed no spans",
            ),
            &["detector"],
        )?;

        let detector_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lexmask_detector_duration_seconds",
                "Detector call duration in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 30.0,
            ]),
            &["detector"],
        )?;

        let ladder_mode = Gauge::with_opts(Opts::new(
            "lexmask_ladder_mode",
            "Active detector ladder rung (0=model_with_patterns, 1=linguistic, 2=patterns_only)",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_failure.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(entities_detected_total.clone()))?;
        registry.register(Box::new(detector_failures_total.clone()))?;
        registry.register(Box::new(detector_duration_seconds.clone()))?;
        registry.register(Box::new(ladder_mode.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            requests_failure,
            request_duration_seconds,
            entities_detected_total,
            detector_failures_total,
            detector_duration_seconds,
            ladder_mode,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a successful request
    pub fn record_request_success(&self, endpoint: &str, duration_secs: f64) {
        self.requests_total.with_label_values(&[endpoint]).inc();
        self.request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    /// Record a failed request
    pub fn record_request_failure(&self, endpoint: &str, error_type: &str, duration_secs: f64) {
        self.requests_total.with_label_values(&[endpoint]).inc();
        self.requests_failure
            .with_label_values(&[endpoint, error_type])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    /// Record one reported entity
    pub fn record_entity(&self, label: &str, source: &str) {
        self.entities_detected_total
            .with_label_values(&[label, source])
            .inc();
    }

    /// Record one detector call
    pub fn record_detector_run(&self, detector: &str, duration_secs: f64, failed: bool) {
        self.detector_duration_seconds
            .with_label_values(&[detector])
            .observe(duration_secs);
        if failed {
            self.detector_failures_total
                .with_label_values(&[detector])
                .inc();
        }
    }

    /// Publish the active ladder rung
    pub fn set_ladder_mode(&self, rung: i64) {
        self.ladder_mode.set(rung as f64);
    }
}
