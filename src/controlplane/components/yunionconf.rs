//! User and global settings service

use super::ComponentDriver;
use crate::controlplane::builder::{cloud_service_deployment, node_port_service, NamedPort, Workload};
use crate::controlplane::constants::{SERVICE_NAME_YUNIONCONF, SERVICE_TYPE_YUNIONCONF, YUNIONCONF_PORT};
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::controlplane::phase::{EndpointTarget, PhaseControl};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::Service;

const PORTS: [NamedPort; 1] = [NamedPort::new("api", YUNIONCONF_PORT)];

pub struct YunionconfDriver;

impl ComponentDriver for YunionconfDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Yunionconf
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Yunionconf, YUNIONCONF_PORT)
            .with_database("yunionconf")
            .with_cloud_user()
            .with_auto_sync_table()
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        Ok(Workload::Deployment(cloud_service_deployment(
            cluster,
            ComponentType::Yunionconf,
            &cluster.spec.yunionconf,
            &PORTS,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Yunionconf, &PORTS))
    }

    fn phase_control(&self, _cluster: &OnecloudCluster) -> Option<PhaseControl> {
        Some(PhaseControl::RegisterEndpoint {
            service_name: SERVICE_NAME_YUNIONCONF,
            service_type: SERVICE_TYPE_YUNIONCONF,
            target: EndpointTarget::new(ComponentType::Yunionconf, YUNIONCONF_PORT),
            admin_port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::options::tests::test_cluster;
    use crate::crd::DbConfig;

    #[test]
    fn test_db_override_per_component() {
        let mut cluster = test_cluster();
        cluster.spec.config.yunionconf.db = Some(DbConfig {
            database: String::new(),
            username: "conf".into(),
            password: "conf-pw".into(),
        });
        let opts = YunionconfDriver.render_options(&cluster).unwrap();
        let db = opts.db.unwrap();
        assert_eq!(db.database, "yunionconf");
        assert_eq!(db.username, "conf");
        assert_eq!(opts.auto_sync_table, Some(true));
    }
}
