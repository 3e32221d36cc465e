//! Operation log service

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{LOGGER_PORT, SERVICE_NAME_LOGGER, SERVICE_TYPE_LOGGER};
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::Service;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", LOGGER_PORT)];

pub struct LoggerDriver;

impl ComponentDriver for LoggerDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Logger
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Logger, LOGGER_PORT)
            .with_database("yunionlogger")
            .with_cloud_user()
            .with_auto_sync_table()
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::Logger,
            &cluster.spec.logger,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Logger, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_LOGGER,
            service_type: SERVICE_TYPE_LOGGER,
            target: EndpointTarget::new(ComponentType::Logger, LOGGER_PORT),
            admin_port: None,
        })
    }
}
