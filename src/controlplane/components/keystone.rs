//! Identity service
//!
//! Keystone serves a public and an admin API and is bootstrapped with the
//! cluster's admin password. Every other service authenticates against it.

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{
    KEYSTONE_ADMIN_PORT, KEYSTONE_PUBLIC_PORT, SERVICE_NAME_KEYSTONE, SERVICE_TYPE_KEYSTONE,
};
use crate::controlplane::options::{self, ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::Service;
use serde_json::json;

const PORTS: [NamedPort; 2] = [
    NamedPort::new("public", KEYSTONE_PUBLIC_PORT),
    NamedPort::new("admin", KEYSTONE_ADMIN_PORT),
];

pub struct KeystoneDriver;

impl ComponentDriver for KeystoneDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Keystone
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Keystone, KEYSTONE_PUBLIC_PORT)
            .with_admin_port(KEYSTONE_ADMIN_PORT)
            .with_database("keystone")
            .with_auto_sync_table()
    }

    fn render_options(&self, cluster: &OnecloudCluster) -> Result<ServiceOptions> {
        let password = &cluster.spec.keystone.bootstrap_password;
        if password.is_empty() {
            return Err(Error::configuration(
                "spec.keystone.bootstrapPassword",
                "must not be empty",
            ));
        }

        let mut opts = options::render(
            cluster,
            &self.profile(),
            cluster.spec.config.get(ComponentType::Keystone),
        )?;
        opts.extra
            .insert("bootstrap_admin_user_password".to_string(), json!(password));
        Ok(opts)
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::Keystone,
            &cluster.spec.keystone.base,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Keystone, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_KEYSTONE,
            service_type: SERVICE_TYPE_KEYSTONE,
            target: EndpointTarget::new(ComponentType::Keystone, KEYSTONE_PUBLIC_PORT)
                .with_prefix("v3"),
            admin_port: Some(KEYSTONE_ADMIN_PORT),
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
    use crate::domain::ports::EndpointInterface;

    #[test]
    fn test_bootstrap_password_rendered() {
        let cluster = test_cluster();
        let opts = KeystoneDriver.render_options(&cluster).unwrap();
        assert_eq!(opts.port, KEYSTONE_PUBLIC_PORT);
        assert_eq!(opts.admin_port, Some(KEYSTONE_ADMIN_PORT));
        assert_eq!(opts.extra["bootstrap_admin_user_password"], json!("admin@123"));
        assert!(opts.admin_user.is_none());
    }

    #[tokio::test]
    async fn test_registers_public_internal_admin() {
        let platform = MemoryPlatform::new();
        let catalog = MemoryCatalog::new();
        let mut cluster = test_cluster();
        sync_once(&KeystoneDriver, &platform, &catalog, &mut cluster).await.unwrap();

        let admin = catalog.endpoint("keystone", EndpointInterface::Admin).unwrap();
        assert_eq!(admin.url, "https://demo-keystone.onecloud.svc:30357/v3");
        assert_eq!(admin.service_type, "identity");
        let public = catalog.endpoint("keystone", EndpointInterface::Public).unwrap();
        assert_eq!(public.url, "https://10.0.0.10:30500/v3");
    }
}
