//! API gateway
//!
//! Browsers reach the gateway through the web front, so its catalog entry
//! points at the web component under `/api`.

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{
    APIGATEWAY_PORT, SERVICE_NAME_APIGATEWAY, SERVICE_TYPE_APIGATEWAY, WEB_HTTPS_PORT,
};
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::Service;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", APIGATEWAY_PORT)];

pub struct ApiGatewayDriver;

impl ComponentDriver for ApiGatewayDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::ApiGateway
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::ApiGateway, APIGATEWAY_PORT).with_cloud_user()
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::ApiGateway,
            &cluster.spec.api_gateway,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::ApiGateway, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterComponent {
            service_name: SERVICE_NAME_APIGATEWAY,
            service_type: SERVICE_TYPE_APIGATEWAY,
            target: Some(EndpointTarget::new(ComponentType::Web, WEB_HTTPS_PORT).with_prefix("api")),
        })
    }
}
