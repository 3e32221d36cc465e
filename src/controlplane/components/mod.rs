//! Component Drivers
//!
//! Each OneCloud service is one [`ComponentDriver`]. Drivers only describe
//! what their service needs (options profile, manifests, catalog
//! registration); [`sync_component`] runs the same convergence algorithm
//! for all of them.

pub mod apigateway;
pub mod climc;
pub mod glance;
pub mod host;
pub mod keystone;
pub mod kubeserver;
pub mod logger;
pub mod region;
pub mod scheduler;
pub mod web;
pub mod webconsole;
pub mod yunionagent;
pub mod yunionconf;

pub use apigateway::ApiGatewayDriver;
pub use climc::ClimcDriver;
pub use glance::GlanceDriver;
pub use host::HostDriver;
pub use keystone::KeystoneDriver;
pub use kubeserver::KubeServerDriver;
pub use logger::LoggerDriver;
pub use region::RegionDriver;
pub use scheduler::SchedulerDriver;
pub use web::WebDriver;
pub use webconsole::WebconsoleDriver;
pub use yunionagent::YunionagentDriver;
pub use yunionconf::YunionconfDriver;

use crate::controlplane::builder::{service_config_map, Workload};
use crate::controlplane::converge::Converger;
use crate::controlplane::metrics::Metrics;
use crate::controlplane::options::{self, ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{derive_phase, PhaseControl};
use crate::crd::{ComponentStatus, OnecloudCluster, OnecloudClusterStatus, Phase, WorkloadStatus};
use crate::domain::ports::{ComponentType, PlatformClient, ResourceKind, ServiceCatalog};
use crate::error::{ComponentError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use tracing::{debug, info, warn};

// =============================================================================
// Sync Context
// =============================================================================

/// External systems a sync talks to
pub struct SyncContext<'a> {
    pub platform: &'a dyn PlatformClient,
    pub catalog: &'a dyn ServiceCatalog,
    pub metrics: &'a Metrics,
}

/// Result of syncing one component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Component is disabled
    Skipped,
    /// Converged; the workload is in this phase
    Synced(Phase),
}

/// Every manifest of one component for one pass
#[derive(Debug, Clone)]
pub struct RenderedManifests {
    pub config_map: Option<ConfigMap>,
    pub workload: Workload,
    pub service: Option<Service>,
    pub volume_claim: Option<PersistentVolumeClaim>,
}

// =============================================================================
// Component Driver
// =============================================================================

/// One OneCloud service
#[async_trait]
pub trait ComponentDriver: Send + Sync {
    fn component_type(&self) -> ComponentType;

    /// Options the renderer applies for this service
    fn profile(&self) -> ServiceProfile;

    fn is_disabled(&self, cluster: &OnecloudCluster) -> bool {
        cluster.spec.is_disabled(self.component_type())
    }

    fn render_options(&self, cluster: &OnecloudCluster) -> Result<ServiceOptions> {
        options::render(
            cluster,
            &self.profile(),
            cluster.spec.config.get(self.component_type()),
        )
    }

    /// Options file bundle, `None` for services configured another way
    fn config_map(
        &self,
        cluster: &OnecloudCluster,
        options: &ServiceOptions,
    ) -> Result<Option<ConfigMap>> {
        service_config_map(cluster, self.component_type(), options).map(Some)
    }

    fn workload(&self, cluster: &OnecloudCluster, options: &ServiceOptions) -> Result<Workload>;

    fn service(&self, _cluster: &OnecloudCluster) -> Option<Service> {
        None
    }

    fn volume_claim(&self, _cluster: &OnecloudCluster) -> Option<PersistentVolumeClaim> {
        None
    }

    /// Catalog registration run on every pass that finds the service Normal
    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        None
    }

    fn status_target<'s>(&self, status: &'s mut OnecloudClusterStatus) -> &'s mut ComponentStatus {
        status.component_mut(self.component_type())
    }

    fn render_manifests(
        &self,
        cluster: &OnecloudCluster,
        options: &ServiceOptions,
    ) -> Result<RenderedManifests> {
        Ok(RenderedManifests {
            config_map: self.config_map(cluster, options)?,
            workload: self.workload(cluster, options)?,
            service: self.service(cluster),
            volume_claim: self.volume_claim(cluster),
        })
    }

    async fn sync(&self, ctx: &SyncContext<'_>, cluster: &mut OnecloudCluster) -> Result<SyncOutcome> {
        sync_component(self, ctx, cluster).await
    }
}

// =============================================================================
// Generic Sync
// =============================================================================

/// Converge one component and record its phase.
///
/// Errors are tagged with the component; status is only written once every
/// step succeeded.
pub async fn sync_component<D: ComponentDriver + ?Sized>(
    driver: &D,
    ctx: &SyncContext<'_>,
    cluster: &mut OnecloudCluster,
) -> Result<SyncOutcome> {
    let component = driver.component_type();

    if driver.is_disabled(cluster) {
        debug!(component = %component, "Disabled, skipping");
        ctx.metrics
            .component_syncs
            .with_label_values(&[component.as_str(), "skipped"])
            .inc();
        return Ok(SyncOutcome::Skipped);
    }

    match converge_component(driver, ctx, cluster).await {
        Ok((phase, workload)) => {
            let status = cluster.status.get_or_insert_with(OnecloudClusterStatus::default);
            let target = driver.status_target(status);
            if target.phase != Some(phase) {
                info!(component = %component, phase = %phase, "Phase changed");
            }
            target.phase = Some(phase);
            target.workload = Some(workload);

            ctx.metrics
                .component_syncs
                .with_label_values(&[component.as_str(), "ok"])
                .inc();
            Ok(SyncOutcome::Synced(phase))
        }
        Err(err) => {
            warn!(component = %component, error = %err, "Sync failed");
            ctx.metrics
                .component_syncs
                .with_label_values(&[component.as_str(), "error"])
                .inc();
            Err(ComponentError::new(component, err).into())
        }
    }
}

async fn converge_component<D: ComponentDriver + ?Sized>(
    driver: &D,
    ctx: &SyncContext<'_>,
    cluster: &OnecloudCluster,
) -> Result<(Phase, WorkloadStatus)> {
    let options = driver.render_options(cluster)?;
    let manifests = driver.render_manifests(cluster, &options)?;
    let namespace = cluster.cluster_namespace();
    let converger = Converger::new(ctx.platform, ctx.metrics);

    if let Some(pvc) = &manifests.volume_claim {
        converger
            .converge(ResourceKind::PersistentVolumeClaim, &namespace, pvc)
            .await?;
    }
    if let Some(cm) = &manifests.config_map {
        converger.converge(ResourceKind::ConfigMap, &namespace, cm).await?;
    }

    let workload = &manifests.workload;
    converger
        .converge(workload.kind(), &namespace, &workload.to_value()?)
        .await?;

    if let Some(svc) = &manifests.service {
        converger.converge(ResourceKind::Service, &namespace, svc).await?;
    }

    let status = converger
        .observe_workload(workload.kind(), &namespace, &workload.name())
        .await?;
    let phase = derive_phase(&status);

    if phase == Phase::Normal {
        if let Some(control) = driver.phase_control(cluster) {
            let outcomes = control.execute(cluster, ctx.catalog).await?;
            for outcome in outcomes {
                ctx.metrics
                    .catalog_upserts
                    .with_label_values(&[control.service_name(), &format!("{:?}", outcome).to_lowercase()])
                    .inc();
            }
        }
    }

    Ok((phase, status))
}

/// Drivers of every component in dependency order
pub fn default_drivers() -> Vec<Box<dyn ComponentDriver>> {
    vec![
        Box::new(KeystoneDriver),
        Box::new(RegionDriver),
        Box::new(SchedulerDriver),
        Box::new(GlanceDriver),
        Box::new(ClimcDriver),
        Box::new(WebconsoleDriver),
        Box::new(LoggerDriver),
        Box::new(YunionconfDriver),
        Box::new(YunionagentDriver),
        Box::new(KubeServerDriver),
        Box::new(ApiGatewayDriver),
        Box::new(WebDriver),
        Box::new(HostDriver),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::controlplane::catalog::MemoryCatalog;
    use crate::controlplane::options::tests::test_cluster;
    use crate::controlplane::platform::MemoryPlatform;
    use crate::error::Error;
    use assert_matches::assert_matches;

    /// Run one driver against in-memory adapters
    pub(crate) async fn sync_once(
        driver: &dyn ComponentDriver,
        platform: &MemoryPlatform,
        catalog: &MemoryCatalog,
        cluster: &mut OnecloudCluster,
    ) -> Result<SyncOutcome> {
        let metrics = Metrics::new()?;
        let ctx = SyncContext {
            platform,
            catalog,
            metrics: &metrics,
        };
        driver.sync(&ctx, cluster).await
    }

    #[test]
    fn test_default_driver_order() {
        let order: Vec<_> = default_drivers().iter().map(|d| d.component_type()).collect();
        assert_eq!(
            order,
            vec![
                ComponentType::Keystone,
                ComponentType::Region,
                ComponentType::Scheduler,
                ComponentType::Glance,
                ComponentType::Climc,
                ComponentType::Webconsole,
                ComponentType::Logger,
                ComponentType::Yunionconf,
                ComponentType::Yunionagent,
                ComponentType::KubeServer,
                ComponentType::ApiGateway,
                ComponentType::Web,
                ComponentType::Host,
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_component_is_untouched() {
        let platform = MemoryPlatform::new();
        let catalog = MemoryCatalog::new();
        let mut cluster = test_cluster();
        cluster.spec.region_server.disable = true;

        let outcome = sync_once(&RegionDriver, &platform, &catalog, &mut cluster).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert_eq!(platform.mutation_count().await, 0);
        assert!(cluster.status.is_none());
    }

    #[tokio::test]
    async fn test_sync_converges_and_registers() {
        let platform = MemoryPlatform::new();
        let catalog = MemoryCatalog::new();
        let mut cluster = test_cluster();

        let outcome = sync_once(&RegionDriver, &platform, &catalog, &mut cluster).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced(Phase::Normal));
        assert_eq!(platform.count(ResourceKind::ConfigMap).await, 1);
        assert_eq!(platform.count(ResourceKind::Deployment).await, 1);
        assert_eq!(platform.count(ResourceKind::Service).await, 1);

        let status = cluster.status.as_ref().unwrap();
        assert_eq!(status.region_server.phase, Some(Phase::Normal));
        assert_eq!(status.region_server.workload.as_ref().unwrap().ready_replicas, 1);
        assert!(catalog.has_service("region2"));
    }

    #[tokio::test]
    async fn test_upgrading_component_skips_registration() {
        let platform = MemoryPlatform::new();
        platform.hold_rollouts(true).await;
        let catalog = MemoryCatalog::new();
        let mut cluster = test_cluster();

        let outcome = sync_once(&RegionDriver, &platform, &catalog, &mut cluster).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced(Phase::Upgrade));
        assert_eq!(catalog.write_count(), 0);
    }

    #[tokio::test]
    async fn test_configuration_error_is_tagged() {
        let platform = MemoryPlatform::new();
        let catalog = MemoryCatalog::new();
        let mut cluster = test_cluster();
        cluster.spec.mysql.host.clear();

        let err = sync_once(&RegionDriver, &platform, &catalog, &mut cluster).await.unwrap_err();
        assert_matches!(err, Error::Component(ref e) if e.component == ComponentType::Region);
        assert!(!err.is_retryable());
        assert_eq!(platform.mutation_count().await, 0);
        assert!(cluster.status.is_none());
    }

    #[tokio::test]
    async fn test_registration_failure_leaves_status() {
        let platform = MemoryPlatform::new();
        let catalog = MemoryCatalog::new();
        catalog.set_failing(true);
        let mut cluster = test_cluster();

        let err = sync_once(&RegionDriver, &platform, &catalog, &mut cluster).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(cluster.status.is_none());
    }
}
