//! Notification and scheduled task agent
//!
//! Keeps its work queue on a volume claim, like the image service.

use super::ComponentDriver;
use crate::controlplane::builder::{
    node_port_service, persistent_volume_claim, stateful_service_deployment, NamedPort, Workload,
};
use crate::controlplane::constants::{
    SERVICE_NAME_YUNIONAGENT, SERVICE_TYPE_YUNIONAGENT, YUNIONAGENT_PORT,
};
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};

const PORTS: [NamedPort; 1] = [NamedPort::new("api", YUNIONAGENT_PORT)];

pub struct YunionagentDriver;

impl ComponentDriver for YunionagentDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Yunionagent
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Yunionagent, YUNIONAGENT_PORT)
            .with_database("yunionagent")
            .with_cloud_user()
            .with_auto_sync_table()
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(stateful_service_deployment(
            cluster,
            ComponentType::Yunionagent,
            &cluster.spec.yunionagent,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Yunionagent, &PORTS))
    }

    fn volume_claim(&self, cluster: &OnecloudCluster) -> Option<PersistentVolumeClaim> {
        Some(persistent_volume_claim(
            cluster,
            ComponentType::Yunionagent,
            &cluster.spec.yunionagent,
        ))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_YUNIONAGENT,
            service_type: SERVICE_TYPE_YUNIONAGENT,
            target: EndpointTarget::new(ComponentType::Yunionagent, YUNIONAGENT_PORT),
            admin_port: None,
        })
    }
}
