//! Image service
//!
//! Stores image files on its own volume claim.

use super::ComponentDriver;
use crate::controlplane::builder::{
    node_port_service, persistent_volume_claim, stateful_service_deployment, NamedPort, Workload,
};
use crate::controlplane::constants::{DATA_DIR, GLANCE_PORT, SERVICE_NAME_GLANCE, SERVICE_TYPE_GLANCE};
use crate::controlplane::options::{self, ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use serde_json::json;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", GLANCE_PORT)];

pub struct GlanceDriver;

impl ComponentDriver for GlanceDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Glance
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Glance, GLANCE_PORT)
            .with_database("glance")
            .with_cloud_user()
            .with_auto_sync_table()
    }

    fn render_options(&self, cluster: &OnecloudCluster) -> Result<ServiceOptions> {
        let mut opts = options::render(
            cluster,
            &self.profile(),
            cluster.spec.config.get(ComponentType::Glance),
        )?;
        opts.extra.insert(
            "filesystem_store_datadir".to_string(),
            json!(format!("{}/{}", DATA_DIR, ComponentType::Glance)),
        );
        Ok(opts)
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(stateful_service_deployment(
            cluster,
            ComponentType::Glance,
            &cluster.spec.glance,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Glance, &PORTS))
    }

    fn volume_claim(&self, cluster: &OnecloudCluster) -> Option<PersistentVolumeClaim> {
        Some(persistent_volume_claim(
            cluster,
            ComponentType::Glance,
            &cluster.spec.glance,
        ))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_GLANCE,
            service_type: SERVICE_TYPE_GLANCE,
            target: EndpointTarget::new(ComponentType::Glance, GLANCE_PORT),
            admin_port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::catalog::MemoryCatalog;
    use crate::controlplane::components::tests::sync_once;
    use crate::controlplane::options::tests::test_cluster;
    use crate::controlplane::platform::MemoryPlatform;
    use crate::domain::ports::ResourceKind;

    #[tokio::test]
    async fn test_claim_created_and_mounted() {
        let platform = MemoryPlatform::new();
        let catalog = MemoryCatalog::new();
        let mut cluster = test_cluster();
        cluster.spec.glance.storage_class_name = Some("local-path".into());
        sync_once(&GlanceDriver, &platform, &catalog, &mut cluster).await.unwrap();

        let pvc = platform
            .object(ResourceKind::PersistentVolumeClaim, "onecloud", "demo-glance")
            .await
            .unwrap();
        assert_eq!(pvc["spec"]["storageClassName"], "local-path");

        let deploy = platform
            .object(ResourceKind::Deployment, "onecloud", "demo-glance")
            .await
            .unwrap();
        let volumes = deploy["spec"]["template"]["spec"]["volumes"].as_array().unwrap();
        assert!(volumes
            .iter()
            .any(|v| v["persistentVolumeClaim"]["claimName"] == "demo-glance"));
        assert_eq!(deploy["spec"]["strategy"]["type"], "Recreate");
    }
}
