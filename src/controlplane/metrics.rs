//! Operator metrics
//!
//! Counters live on a private registry so several orchestrators (tests,
//! standalone runs) never collide on the process-global default registry.

use crate::error::{Error, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Prometheus metrics of the reconcile engine
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Reconcile passes by result
    pub reconciles: IntCounterVec,
    /// Component syncs by component and result
    pub component_syncs: IntCounterVec,
    /// Create/patch calls by kind and verb
    pub platform_mutations: IntCounterVec,
    /// Catalog upserts by service and outcome
    pub catalog_upserts: IntCounterVec,
    /// Wall time of a reconcile pass
    pub reconcile_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let reconciles = IntCounterVec::new(
            Opts::new("onecloud_operator_reconciles_total", "Reconcile passes"),
            &["result"],
        )
        .map_err(metric_error)?;
        let component_syncs = IntCounterVec::new(
            Opts::new(
                "onecloud_operator_component_syncs_total",
                "Component sync attempts",
            ),
            &["component", "result"],
        )
        .map_err(metric_error)?;
        let platform_mutations = IntCounterVec::new(
            Opts::new(
                "onecloud_operator_platform_mutations_total",
                "Create and patch calls against the orchestration platform",
            ),
            &["kind", "verb"],
        )
        .map_err(metric_error)?;
        let catalog_upserts = IntCounterVec::new(
            Opts::new(
                "onecloud_operator_catalog_upserts_total",
                "Service catalog upserts",
            ),
            &["service", "outcome"],
        )
        .map_err(metric_error)?;
        let reconcile_duration = Histogram::with_opts(HistogramOpts::new(
            "onecloud_operator_reconcile_duration_seconds",
            "Duration of a reconcile pass",
        ))
        .map_err(metric_error)?;

        registry
            .register(Box::new(reconciles.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(component_syncs.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(platform_mutations.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(catalog_upserts.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(reconcile_duration.clone()))
            .map_err(metric_error)?;

        Ok(Self {
            registry,
            reconciles,
            component_syncs,
            platform_mutations,
            catalog_upserts,
            reconcile_duration,
        })
    }

    /// Text exposition of every metric
    pub fn gather(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

fn metric_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}
