//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters relevant to the settings service.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{CollectorStage, Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    settings_reads_total: IntCounter,
    settings_writes_total: IntCounter,
    authorization_denials_total: IntCounterVec,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Settings reads served.
    pub settings_reads_total: u64,
    /// Settings writes persisted.
    pub settings_writes_total: u64,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
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
        let inner = MetricsInner {
            http_requests_total: register(
                &registry,
                "http_requests_total",
                IntCounterVec::new(
                    Opts::new("http_requests_total", "HTTP responses by matched route and status"),
                    &["route", "code"],
                ),
            )?,
            settings_reads_total: register(
                &registry,
                "settings_reads_total",
                IntCounter::new("settings_reads_total", "Settings snapshots served to clients"),
            )?,
            settings_writes_total: register(
                &registry,
                "settings_writes_total",
                IntCounter::new("settings_writes_total", "Settings snapshots persisted"),
            )?,
            authorization_denials_total: register(
                &registry,
                "authorization_denials_total",
                IntCounterVec::new(
                    Opts::new(
                        "authorization_denials_total",
                        "Requests rejected by capability or token checks",
                    ),
                    &["reason"],
                ),
            )?,
            registry,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a settings read.
    pub fn inc_settings_read(&self) {
        self.inner.settings_reads_total.inc();
    }

    /// Count a settings write.
    pub fn inc_settings_write(&self) {
        self.inner.settings_writes_total.inc();
    }

    /// Count a rejected request by reason code.
    pub fn inc_authorization_denial(&self, reason: &str) {
        self.inner
            .authorization_denials_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::Exposition { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionUtf8 { source })
    }

    /// Take a point-in-time snapshot of the settings counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            settings_reads_total: self.inner.settings_reads_total.get(),
            settings_writes_total: self.inner.settings_writes_total.get(),
        }
    }
}

/// Build-and-register step shared by every collector.
fn register<C>(
    registry: &Registry,
    name: &'static str,
    built: prometheus::Result<C>,
) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    let collector = built.map_err(|source| TelemetryError::Collector {
        name,
        stage: CollectorStage::Build,
        source,
    })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Collector {
            name,
            stage: CollectorStage::Register,
            source,
        })?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_and_snapshot() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/plinth/v1/settings", 200);
        metrics.inc_settings_read();
        metrics.inc_settings_write();
        metrics.inc_settings_write();
        metrics.inc_authorization_denial("rest_forbidden");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.settings_reads_total, 1);
        assert_eq!(snapshot.settings_writes_total, 2);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("code=\"200\""));
        assert!(rendered.contains("authorization_denials_total{reason=\"rest_forbidden\"} 1"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_settings_read();
        assert_eq!(second.snapshot().settings_reads_total, 0);
        Ok(())
    }
}
