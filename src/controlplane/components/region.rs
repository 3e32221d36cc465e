//! Region service: the compute API
//!
//! Owns the main cloud database and keeps its object locks in etcd.

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{REGION_PORT, SERVICE_NAME_REGION, SERVICE_TYPE_REGION};
use crate::controlplane::options::{self, ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::Service;
use serde_json::json;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", REGION_PORT)];

pub struct RegionDriver;

impl ComponentDriver for RegionDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Region
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Region, REGION_PORT)
            .with_database("yunioncloud")
            .with_cloud_user()
            .with_auto_sync_table()
            .with_etcd()
    }

    fn render_options(&self, cluster: &OnecloudCluster) -> Result<ServiceOptions> {
        let mut opts = options::render(
            cluster,
            &self.profile(),
            cluster.spec.config.get(ComponentType::Region),
        )?;
        // v2 API is served on the same listener
        opts.extra.insert("port_v2".to_string(), json!(REGION_PORT));
        Ok(opts)
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::Region,
            &cluster.spec.region_server,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Region, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_REGION,
            service_type: SERVICE_TYPE_REGION,
            target: EndpointTarget::new(ComponentType::Region, REGION_PORT),
            admin_port: None,
        })
    }
}
