//! Kubernetes cluster management service

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{KUBESERVER_PORT, SERVICE_NAME_KUBESERVER, SERVICE_TYPE_KUBESERVER};
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::Service;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", KUBESERVER_PORT)];

pub struct KubeServerDriver;

impl ComponentDriver for KubeServerDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::KubeServer
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::KubeServer, KUBESERVER_PORT)
            .with_database("kubeserver")
            .with_cloud_user()
            .with_auto_sync_table()
            .with_etcd()
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::KubeServer,
            &cluster.spec.kube_server,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::KubeServer, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_KUBESERVER,
            service_type: SERVICE_TYPE_KUBESERVER,
            target: EndpointTarget::new(ComponentType::KubeServer, KUBESERVER_PORT),
            admin_port: None,
        })
    }
}
