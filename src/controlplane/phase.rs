//! Phase derivation and post-rollout catalog registration

use crate::controlplane::builder::component_address;
use crate::controlplane::options::scheme;
use crate::crd::{OnecloudCluster, Phase, WorkloadStatus};
use crate::domain::ports::{
    ComponentType, EndpointInterface, ServiceCatalog, ServiceCatalogEntry, UpsertOutcome,
};
use crate::error::Result;
use tracing::debug;

/// Phase of a workload from its rollout counters.
///
/// Normal once the controller has acted on the latest spec and every desired
/// replica both runs the current template and is ready.
pub fn derive_phase(status: &WorkloadStatus) -> Phase {
    let observed = status.observed_generation >= status.generation;
    let rolled_out = status.updated_replicas >= status.replicas;
    if observed && rolled_out && status.ready_replicas >= status.replicas {
        Phase::Normal
    } else {
        Phase::Upgrade
    }
}

/// Worst phase among enabled components; components never synced count as
/// upgrading.
pub fn cluster_phase(cluster: &OnecloudCluster, components: &[ComponentType]) -> Phase {
    let status = cluster.status.clone().unwrap_or_default();
    components
        .iter()
        .filter(|c| !cluster.spec.is_disabled(**c))
        .map(|c| status.component(*c).phase.unwrap_or(Phase::Upgrade))
        .max()
        .unwrap_or(Phase::Normal)
}

// =============================================================================
// Phase Control
// =============================================================================

/// Where a catalog endpoint points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointTarget {
    pub component: ComponentType,
    pub port: u16,
    /// Path appended to the URL, e.g. `v3`
    pub prefix: Option<&'static str>,
}

impl EndpointTarget {
    pub const fn new(component: ComponentType, port: u16) -> Self {
        Self {
            component,
            port,
            prefix: None,
        }
    }

    pub const fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    fn url(&self, tls: bool, host: &str, port: u16) -> String {
        let base = format!("{}://{}:{}", scheme(tls), host, port);
        match self.prefix {
            Some(prefix) => format!("{}/{}", base, prefix),
            None => base,
        }
    }
}

/// Registration a component performs once its rollout is Normal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseControl {
    /// Publish the component's own endpoints
    RegisterEndpoint {
        service_name: &'static str,
        service_type: &'static str,
        target: EndpointTarget,
        admin_port: Option<u16>,
    },
    /// Record a service, optionally reachable through another component
    RegisterComponent {
        service_name: &'static str,
        service_type: &'static str,
        target: Option<EndpointTarget>,
    },
}

impl PhaseControl {
    pub fn service_name(&self) -> &'static str {
        match self {
            PhaseControl::RegisterEndpoint { service_name, .. }
            | PhaseControl::RegisterComponent { service_name, .. } => service_name,
        }
    }

    /// Catalog entries this control upserts for a cluster.
    ///
    /// The public endpoint needs a load balancer address and is left out
    /// without one.
    pub fn entries(&self, cluster: &OnecloudCluster) -> Vec<ServiceCatalogEntry> {
        let (service_name, service_type, target, admin_port) = match self {
            PhaseControl::RegisterEndpoint {
                service_name,
                service_type,
                target,
                admin_port,
            } => (*service_name, *service_type, *target, *admin_port),
            PhaseControl::RegisterComponent {
                service_name,
                service_type,
                target: Some(target),
            } => (*service_name, *service_type, *target, None),
            PhaseControl::RegisterComponent { target: None, .. } => return Vec::new(),
        };

        let spec = &cluster.spec;
        let tls = spec.enable_tls;
        let internal_host = component_address(cluster, target.component);
        let entry = |interface, url| ServiceCatalogEntry {
            service_name: service_name.to_string(),
            service_type: service_type.to_string(),
            interface,
            region: spec.region.clone(),
            url,
        };

        let mut entries = vec![entry(
            EndpointInterface::Internal,
            target.url(tls, &internal_host, target.port),
        )];
        if !spec.load_balancer_endpoint.is_empty() {
            entries.push(entry(
                EndpointInterface::Public,
                target.url(tls, &spec.load_balancer_endpoint, target.port),
            ));
        }
        if let Some(admin_port) = admin_port {
            entries.push(entry(
                EndpointInterface::Admin,
                target.url(tls, &internal_host, admin_port),
            ));
        }
        entries
    }

    /// Upsert this control's records into the catalog
    pub async fn execute(
        &self,
        cluster: &OnecloudCluster,
        catalog: &dyn ServiceCatalog,
    ) -> Result<Vec<UpsertOutcome>> {
        if let PhaseControl::RegisterComponent {
            service_name,
            service_type,
            target: None,
        } = self
        {
            return Ok(vec![catalog.ensure_service(service_name, service_type).await?]);
        }

        let mut outcomes = Vec::new();
        for entry in self.entries(cluster) {
            let outcome = catalog.upsert_endpoint(&entry).await?;
            debug!(
                service = %entry.service_name,
                interface = %entry.interface,
                outcome = ?outcome,
                "Catalog entry"
            );
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}
