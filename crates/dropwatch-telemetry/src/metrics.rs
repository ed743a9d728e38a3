//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - One `dispatch_outcomes_total` increment per finished dispatch, so the counter
//!   doubles as the audit trail for "every trigger reaches a terminal state".

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

const BUILD: &str = "metrics.build";

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    dispatch_outcomes_total: IntCounterVec,
    dispatches_total: IntCounter,
    uploads_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    inflight_dispatches: IntGauge,
}

/// Snapshot of selected gauges and counters, logged at shutdown.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Dispatches that reached a terminal state.
    pub dispatches_total: u64,
    /// Dispatches currently holding an in-flight claim.
    pub inflight_dispatches: i64,
    /// Uploads that completed successfully.
    pub uploads_succeeded: u64,
    /// Uploads that failed or timed out.
    pub uploads_failed: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let dispatch_outcomes_total = counter_vec(
            "dispatch_outcomes_total",
            "Finished file dispatches by terminal outcome",
            "outcome",
        )?;
        let dispatches_total =
            IntCounter::with_opts(Opts::new("dispatches_total", "Finished file dispatches"))
                .map_err(|source| TelemetryError::metric(BUILD, "dispatches_total", source))?;
        let uploads_total = counter_vec("uploads_total", "Remote uploads by status", "status")?;
        let events_emitted_total = counter_vec(
            "events_emitted_total",
            "Domain events emitted by type",
            "type",
        )?;
        let inflight_dispatches = IntGauge::with_opts(Opts::new(
            "inflight_dispatches",
            "Paths currently claimed by a dispatch",
        ))
        .map_err(|source| TelemetryError::metric(BUILD, "inflight_dispatches", source))?;

        register(&registry, "dispatch_outcomes_total", &dispatch_outcomes_total)?;
        register(&registry, "dispatches_total", &dispatches_total)?;
        register(&registry, "uploads_total", &uploads_total)?;
        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(&registry, "inflight_dispatches", &inflight_dispatches)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                dispatch_outcomes_total,
                dispatches_total,
                uploads_total,
                events_emitted_total,
                inflight_dispatches,
            }),
        })
    }

    /// Record a finished dispatch with its terminal outcome label.
    pub fn inc_dispatch_outcome(&self, outcome: &str) {
        self.inner
            .dispatch_outcomes_total
            .with_label_values(&[outcome])
            .inc();
        self.inner.dispatches_total.inc();
    }

    /// Number of dispatches recorded for `outcome`.
    #[must_use]
    pub fn dispatch_outcome_count(&self, outcome: &str) -> u64 {
        self.inner
            .dispatch_outcomes_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Increment the upload counter for the given status (`ok`, `failed`, `timeout`).
    pub fn inc_upload(&self, status: &str) {
        self.inner.uploads_total.with_label_values(&[status]).inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Note that a path was claimed for dispatch.
    pub fn inc_inflight(&self) {
        self.inner.inflight_dispatches.inc();
    }

    /// Note that a dispatch claim was released.
    pub fn dec_inflight(&self) {
        self.inner.inflight_dispatches.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uploads = &self.inner.uploads_total;
        MetricsSnapshot {
            dispatches_total: self.inner.dispatches_total.get(),
            inflight_dispatches: self.inner.inflight_dispatches.get(),
            uploads_succeeded: uploads.with_label_values(&["ok"]).get(),
            uploads_failed: uploads.with_label_values(&["failed"]).get()
                + uploads.with_label_values(&["timeout"]).get(),
        }
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::metric("metrics.register", name, source))
}

fn counter_vec(name: &'static str, help: &str, label: &str) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), &[label])
        .map_err(|source| TelemetryError::metric(BUILD, name, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_dispatch_outcome("transferred");
        metrics.inc_dispatch_outcome("transferred");
        metrics.inc_dispatch_outcome("no_match");
        metrics.inc_upload("ok");
        metrics.inc_upload("timeout");
        metrics.inc_event("file_dispatched");
        metrics.inc_inflight();
        metrics.inc_inflight();
        metrics.dec_inflight();

        assert_eq!(metrics.dispatch_outcome_count("transferred"), 2);
        assert_eq!(metrics.dispatch_outcome_count("no_match"), 1);
        assert_eq!(metrics.dispatch_outcome_count("busy"), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                dispatches_total: 3,
                inflight_dispatches: 1,
                uploads_succeeded: 1,
                uploads_failed: 1,
            }
        );

        let rendered = metrics.render()?;
        assert!(rendered.contains("dispatch_outcomes_total"));
        assert!(rendered.contains("inflight_dispatches"));
        Ok(())
    }

    #[test]
    fn duplicate_registration_names_the_metric() -> anyhow::Result<()> {
        let registry = Registry::new();
        let counter = counter_vec("uploads_total", "Remote uploads by status", "status")?;
        register(&registry, "uploads_total", &counter)?;

        let err = register(&registry, "uploads_total", &counter)
            .err()
            .ok_or_else(|| anyhow::anyhow!("second registration must fail"))?;
        assert!(matches!(
            err,
            TelemetryError::Metric {
                operation: "metrics.register",
                name: "uploads_total",
                ..
            }
        ));
        assert_eq!(err.to_string(), "metric setup failed");
        assert!(std::error::Error::source(&err).is_some());
        Ok(())
    }

    #[test]
    fn invalid_metric_names_fail_to_build() {
        assert!(matches!(
            counter_vec("not a metric", "help", "label"),
            Err(TelemetryError::Metric {
                operation: "metrics.build",
                ..
            })
        ));
    }

    #[test]
    fn registries_are_independent() -> anyhow::Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_dispatch_outcome("transferred");
        assert_eq!(second.dispatch_outcome_count("transferred"), 0);
        Ok(())
    }
}
