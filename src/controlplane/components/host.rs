//! Host agent
//!
//! Runs privileged on every node labelled for virtualization. Hosts
//! register themselves with the region, so the catalog only needs the
//! service record.

use super::ComponentDriver;
use crate::controlplane::builder::{host_privileged_daemon_set, Workload};
use crate::controlplane::constants::{HOST_PORT, SERVICE_NAME_HOST, SERVICE_TYPE_HOST};
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::controlplane::phase::PhaseControl;
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;

pub struct HostDriver;

impl ComponentDriver for HostDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Host
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Host, HOST_PORT).with_cloud_user()
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::DaemonSet(host_privileged_daemon_set(
            cluster,
            ComponentType::Host,
            &cluster.spec.host_agent.base,
        )))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterComponent {
            service_name: SERVICE_NAME_HOST,
            service_type: SERVICE_TYPE_HOST,
            target: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::catalog::MemoryCatalog;
    use crate::controlplane::components::tests::sync_once;
    use crate::controlplane::components::SyncOutcome;
    use crate::controlplane::options::tests::test_cluster;
    use crate::controlplane::platform::MemoryPlatform;
    use crate::crd::Phase;
    use crate::domain::ports::ResourceKind;

    #[tokio::test]
    async fn test_host_daemon_set_sync() {
        let platform = MemoryPlatform::with_nodes(3);
        let catalog = MemoryCatalog::new();
        let mut cluster = test_cluster();

        let outcome = sync_once(&HostDriver, &platform, &catalog, &mut cluster).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced(Phase::Normal));
        assert_eq!(platform.count(ResourceKind::DaemonSet).await, 1);
        assert_eq!(platform.count(ResourceKind::Service).await, 0);
        assert!(catalog.has_service("host"));
        assert!(catalog.entries().is_empty());

        let status = cluster.status.unwrap();
        assert_eq!(status.host_agent.workload.unwrap().ready_replicas, 3);
    }
}
