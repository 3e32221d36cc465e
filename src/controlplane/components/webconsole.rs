//! Web console proxy for VNC and SSH sessions

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{SERVICE_NAME_WEBCONSOLE, SERVICE_TYPE_WEBCONSOLE, WEBCONSOLE_PORT};
use crate::controlplane::options::{self, ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::Service;
use serde_json::json;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", WEBCONSOLE_PORT)];

pub struct WebconsoleDriver;

impl ComponentDriver for WebconsoleDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Webconsole
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Webconsole, WEBCONSOLE_PORT).with_cloud_user()
    }

    fn render_options(&self, cluster: &OnecloudCluster) -> Result<ServiceOptions> {
        let mut opts = options::render(
            cluster,
            &self.profile(),
            cluster.spec.config.get(ComponentType::Webconsole),
        )?;
        // Browsers reach sessions through the web front
        if !cluster.spec.load_balancer_endpoint.is_empty() {
            opts.extra.insert(
                "api_server".to_string(),
                json!(format!("https://{}", cluster.spec.load_balancer_endpoint)),
            );
        }
        Ok(opts)
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::Webconsole,
            &cluster.spec.webconsole,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Webconsole, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_WEBCONSOLE,
            service_type: SERVICE_TYPE_WEBCONSOLE,
            target: EndpointTarget::new(ComponentType::Webconsole, WEBCONSOLE_PORT),
            admin_port: None,
        })
    }
}
