//! Scheduler service

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{SCHEDULER_PORT, SERVICE_NAME_SCHEDULER, SERVICE_TYPE_SCHEDULER};
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::Service;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", SCHEDULER_PORT)];

pub struct SchedulerDriver;

impl ComponentDriver for SchedulerDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Scheduler
    }

    /// Reads the region database; the region owns its schema
    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Scheduler, SCHEDULER_PORT)
            .with_database("yunioncloud")
            .with_cloud_user()
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::Scheduler,
            &cluster.spec.scheduler,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Scheduler, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_SCHEDULER,
            service_type: SERVICE_TYPE_SCHEDULER,
            target: EndpointTarget::new(ComponentType::Scheduler, SCHEDULER_PORT),
            admin_port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::options::tests::test_cluster;

    #[test]
    fn test_scheduler_never_migrates_schema() {
        let opts = SchedulerDriver.render_options(&test_cluster()).unwrap();
        assert_eq!(opts.auto_sync_table, None);
        assert_eq!(opts.db.unwrap().database, "yunioncloud");
    }
}
