//! Reconciliation Orchestrator
//!
//! Runs every component driver over one cluster in dependency order. A
//! failing component never stops the pass: its error is collected and the
//! remaining components still converge. After the pass the cluster phase is
//! folded from the component phases and the pass time is stamped.

use crate::controlplane::catalog::CatalogProvider;
use crate::controlplane::components::{default_drivers, ComponentDriver, SyncContext, SyncOutcome};
use crate::controlplane::metrics::Metrics;
use crate::controlplane::phase::cluster_phase;
use crate::crd::{OnecloudCluster, OnecloudClusterStatus, Phase};
use crate::domain::ports::{ComponentType, PlatformClientRef};
use crate::error::{Error, ReconcileErrors, Result};
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

// =============================================================================
// Operator Configuration
// =============================================================================

/// Settings shared by the orchestrator and the controller loop
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace to watch, all namespaces when unset
    pub namespace: Option<String>,
    /// Requeue interval after a clean pass, in seconds
    pub requeue_interval_secs: u64,
    /// Requeue interval after a retryable failure, in seconds
    pub error_requeue_secs: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            requeue_interval_secs: 300,
            error_requeue_secs: 15,
        }
    }
}

// =============================================================================
// Reconcile Report
// =============================================================================

/// What happened to one component in the last pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReport {
    pub component: ComponentType,
    /// `skipped`, `synced` or `failed`
    pub result: String,
    pub phase: Option<Phase>,
    pub error: Option<String>,
}

/// Summary of the last reconcile pass of a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub namespace: String,
    pub name: String,
    pub phase: Phase,
    pub components: Vec<ComponentReport>,
    pub failed: Vec<ComponentType>,
    pub reconciled_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    pub fn key(&self) -> String {
        report_key(&self.namespace, &self.name)
    }
}

fn report_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives all components of a cluster toward its spec
pub struct Orchestrator {
    config: OperatorConfig,
    platform: PlatformClientRef,
    catalogs: Arc<dyn CatalogProvider>,
    drivers: Vec<Box<dyn ComponentDriver>>,
    metrics: Metrics,
    /// Last report per `namespace/name`
    reports: RwLock<BTreeMap<String, ReconcileReport>>,
}

impl Orchestrator {
    /// Create an orchestrator with every OneCloud component
    pub fn new(
        config: OperatorConfig,
        platform: PlatformClientRef,
        catalogs: Arc<dyn CatalogProvider>,
        metrics: Metrics,
    ) -> Arc<Self> {
        Self::with_drivers(config, platform, catalogs, metrics, default_drivers())
    }

    /// Create an orchestrator with a custom driver list, run in list order
    pub fn with_drivers(
        config: OperatorConfig,
        platform: PlatformClientRef,
        catalogs: Arc<dyn CatalogProvider>,
        metrics: Metrics,
        drivers: Vec<Box<dyn ComponentDriver>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            platform,
            catalogs,
            drivers,
            metrics,
            reports: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Components handled, in order
    pub fn components(&self) -> Vec<ComponentType> {
        self.drivers.iter().map(|d| d.component_type()).collect()
    }

    /// Run one reconcile pass.
    ///
    /// The cluster status is updated in place even when components fail;
    /// the returned error lists every failed component.
    pub async fn reconcile(&self, cluster: &mut OnecloudCluster) -> Result<()> {
        let started = Instant::now();
        let namespace = cluster.cluster_namespace();
        let name = cluster.cluster_name();
        info!(cluster = %name, namespace = %namespace, "Reconciling");

        let catalog = self.catalogs.catalog_for(cluster).await?;
        let ctx = SyncContext {
            platform: self.platform.as_ref(),
            catalog: catalog.as_ref(),
            metrics: &self.metrics,
        };

        let mut errors = ReconcileErrors::new();
        let mut components = Vec::with_capacity(self.drivers.len());

        for driver in &self.drivers {
            let component = driver.component_type();
            let report = match driver.sync(&ctx, cluster).await {
                Ok(SyncOutcome::Skipped) => ComponentReport {
                    component,
                    result: "skipped".to_string(),
                    phase: None,
                    error: None,
                },
                Ok(SyncOutcome::Synced(phase)) => ComponentReport {
                    component,
                    result: "synced".to_string(),
                    phase: Some(phase),
                    error: None,
                },
                Err(err) => {
                    let report = ComponentReport {
                        component,
                        result: "failed".to_string(),
                        phase: None,
                        error: Some(err.to_string()),
                    };
                    match err {
                        Error::Component(e) => errors.push(e),
                        other => errors.push(crate::error::ComponentError::new(component, other)),
                    }
                    report
                }
            };
            components.push(report);
        }

        let phase = cluster_phase(cluster, &self.components());
        let uid = cluster.uid();
        let status = cluster.status.get_or_insert_with(OnecloudClusterStatus::default);
        if status.phase != Some(phase) {
            info!(cluster = %name, phase = %phase, "Cluster phase changed");
        }
        status.phase = Some(phase);
        if status.cluster_id.is_none() {
            status.cluster_id = uid;
        }
        let now = Utc::now();
        status.last_reconcile_time = Some(now);

        let elapsed = started.elapsed();
        self.metrics.reconcile_duration.observe(elapsed.as_secs_f64());
        let result = if errors.is_empty() { "ok" } else { "error" };
        self.metrics.reconciles.with_label_values(&[result]).inc();

        let report = ReconcileReport {
            namespace,
            name: name.clone(),
            phase,
            components,
            failed: errors.components(),
            reconciled_at: now,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };
        self.reports.write().await.insert(report.key(), report);

        if !errors.is_empty() {
            warn!(cluster = %name, failed = errors.len(), "Reconcile finished with errors");
        }
        errors.into_result()
    }

    /// Last report of every cluster
    pub async fn reports(&self) -> Vec<ReconcileReport> {
        self.reports.read().await.values().cloned().collect()
    }

    /// Last report of one cluster
    pub async fn report(&self, namespace: &str, name: &str) -> Option<ReconcileReport> {
        self.reports.read().await.get(&report_key(namespace, name)).cloned()
    }

    /// Drop the report of a deleted cluster
    pub async fn forget(&self, namespace: &str, name: &str) {
        self.reports.write().await.remove(&report_key(namespace, name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::catalog::{MemoryCatalog, StaticCatalogProvider};
    use crate::controlplane::options::tests::test_cluster;
    use crate::controlplane::platform::MemoryPlatform;
    use crate::crd::ResourceRequirement;
    use crate::domain::ports::{EndpointInterface, ResourceKind};
    use assert_matches::assert_matches;

    struct Fixture {
        platform: Arc<MemoryPlatform>,
        catalog: Arc<MemoryCatalog>,
        orchestrator: Arc<Orchestrator>,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(MemoryPlatform::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let orchestrator = Orchestrator::new(
            OperatorConfig::default(),
            platform.clone(),
            Arc::new(StaticCatalogProvider::new(catalog.clone())),
            Metrics::new().unwrap(),
        );
        Fixture {
            platform,
            catalog,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_full_pass_reaches_normal() {
        let f = fixture();
        let mut cluster = test_cluster();
        f.orchestrator.reconcile(&mut cluster).await.unwrap();

        let status = cluster.status.as_ref().unwrap();
        assert_eq!(status.phase, Some(Phase::Normal));
        assert!(status.last_reconcile_time.is_some());
        for component in f.orchestrator.components() {
            assert_eq!(status.component(component).phase, Some(Phase::Normal), "{}", component);
        }
        assert_eq!(f.platform.count(ResourceKind::Deployment).await, 12);
        assert_eq!(f.platform.count(ResourceKind::DaemonSet).await, 1);
        assert_eq!(f.platform.count(ResourceKind::PersistentVolumeClaim).await, 2);
        assert!(f.catalog.endpoint("keystone", EndpointInterface::Admin).is_some());
        assert!(f.catalog.endpoint("yunionapi", EndpointInterface::Internal).is_some());
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let f = fixture();
        let mut cluster = test_cluster();
        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        let mutations = f.platform.mutation_count().await;
        let writes = f.catalog.write_count();

        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        assert_eq!(f.platform.mutation_count().await, mutations);
        assert_eq!(f.catalog.write_count(), writes);
    }

    #[tokio::test]
    async fn test_spec_change_patches_only_affected_objects() {
        let f = fixture();
        let mut cluster = test_cluster();
        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        let mutations = f.platform.mutation_count().await;

        cluster.spec.scheduler.replicas = 3;
        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        assert_eq!(f.platform.mutation_count().await, mutations + 1);

        let deploy = f
            .platform
            .object(ResourceKind::Deployment, "onecloud", "demo-scheduler")
            .await
            .unwrap();
        assert_eq!(deploy["spec"]["replicas"], 3);
    }

    #[tokio::test]
    async fn test_cleared_placement_and_limits_converge() {
        let f = fixture();
        let mut cluster = test_cluster();
        cluster.spec.region_server.node_selector =
            Some(BTreeMap::from([("rack".to_string(), "r1".to_string())]));
        cluster.spec.region_server.container.limits = Some(ResourceRequirement {
            cpu: Some("2".to_string()),
            ..Default::default()
        });
        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        let mutations = f.platform.mutation_count().await;

        cluster.spec.region_server.node_selector = None;
        cluster.spec.region_server.container.limits = None;
        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        assert_eq!(f.platform.mutation_count().await, mutations + 1);

        let deploy = f
            .platform
            .object(ResourceKind::Deployment, "onecloud", "demo-region")
            .await
            .unwrap();
        let pod = &deploy["spec"]["template"]["spec"];
        assert_eq!(pod["nodeSelector"].get("rack"), None);
        assert_eq!(pod["containers"][0].get("resources"), None);
    }

    #[tokio::test]
    async fn test_disabled_components_excluded() {
        let f = fixture();
        let mut cluster = test_cluster();
        cluster.spec.glance.base.disable = true;
        cluster.spec.host_agent.base.disable = true;
        f.orchestrator.reconcile(&mut cluster).await.unwrap();

        assert!(f
            .platform
            .object(ResourceKind::Deployment, "onecloud", "demo-glance")
            .await
            .is_none());
        assert_eq!(f.platform.count(ResourceKind::DaemonSet).await, 0);
        assert!(!f.catalog.has_service("glance"));

        let status = cluster.status.as_ref().unwrap();
        assert_eq!(status.glance.phase, None);
        assert_eq!(status.phase, Some(Phase::Normal));
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let f = fixture();
        f.platform.fail_writes_for("demo-region").await;
        let mut cluster = test_cluster();

        let err = f.orchestrator.reconcile(&mut cluster).await.unwrap_err();
        assert_matches!(err, Error::Reconcile(ref errors) if errors.components() == vec![ComponentType::Region]);
        assert!(err.is_retryable());

        let status = cluster.status.as_ref().unwrap();
        assert_eq!(status.region_server.phase, None);
        assert_eq!(status.scheduler.phase, Some(Phase::Normal));
        assert_eq!(status.host_agent.phase, Some(Phase::Normal));
        assert_eq!(status.phase, Some(Phase::Upgrade));
        assert!(status.last_reconcile_time.is_some());

        let report = f.orchestrator.report("onecloud", "demo").await.unwrap();
        assert_eq!(report.failed, vec![ComponentType::Region]);

        f.platform.clear_failures().await;
        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        assert_eq!(cluster.status.unwrap().phase, Some(Phase::Normal));
    }

    #[tokio::test]
    async fn test_configuration_errors_do_not_requeue() {
        let f = fixture();
        let mut cluster = test_cluster();
        cluster.spec.keystone.bootstrap_password.clear();

        let err = f.orchestrator.reconcile(&mut cluster).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(f.platform.count(ResourceKind::DaemonSet).await, 0);
    }

    #[tokio::test]
    async fn test_rollout_then_registration() {
        let f = fixture();
        f.platform.hold_rollouts(true).await;
        let mut cluster = test_cluster();

        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        assert_eq!(cluster.status.as_ref().unwrap().phase, Some(Phase::Upgrade));
        assert_eq!(f.catalog.write_count(), 0);

        f.platform.complete_rollouts().await;
        f.orchestrator.reconcile(&mut cluster).await.unwrap();
        assert_eq!(cluster.status.as_ref().unwrap().phase, Some(Phase::Normal));
        assert!(f.catalog.has_service("region2"));
    }
}
