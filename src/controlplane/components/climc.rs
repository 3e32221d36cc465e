//! Admin command line console
//!
//! climc has no options file and listens on nothing: it is a long-running
//! pod operators exec into, configured through the standard client
//! environment variables.

use super::ComponentDriver;
use crate::controlplane::builder::{
    config_volumes, deployment, node_selector, pod_template, resolve_image, resource_requirements,
    Workload,
};
use crate::controlplane::constants::CERT_DIR;
use crate::controlplane::options::{ServiceOptions, ServiceProfile};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::{ConfigMap, Container, EnvVar};

pub struct ClimcDriver;

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// Client environment derived from the rendered credentials
pub fn client_env(options: &ServiceOptions) -> Vec<EnvVar> {
    vec![
        env("OS_AUTH_URL", options.auth_url.clone()),
        env("OS_USERNAME", options.admin_user.clone().unwrap_or_default()),
        env("OS_PASSWORD", options.admin_password.clone().unwrap_or_default()),
        env("OS_PROJECT_NAME", options.admin_project.clone()),
        env("OS_REGION_NAME", options.region.clone()),
        env("YUNION_INSECURE", if options.enable_ssl { "true" } else { "false" }),
    ]
}

impl ComponentDriver for ClimcDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Climc
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Climc, 0).with_cloud_user()
    }

    fn config_map(
        &self,
        _cluster: &OnecloudCluster,
        _options: &ServiceOptions,
    ) -> Result<Option<ConfigMap>> {
        Ok(None)
    }

    fn workload(&self, cluster: &OnecloudCluster, options: &ServiceOptions) -> Result<Workload> {
        let spec = &cluster.spec.climc;
        // Only the certificates are mounted; there is no options file
        let (volumes, mounts) = config_volumes(cluster, ComponentType::Climc);
        let (volumes, mounts): (Vec<_>, Vec<_>) = volumes
            .into_iter()
            .zip(mounts)
            .filter(|(_, m)| m.mount_path == CERT_DIR)
            .unzip();

        let container = Container {
            name: ComponentType::Climc.to_string(),
            image: Some(resolve_image(cluster, ComponentType::Climc, &spec.container)),
            image_pull_policy: spec.container.image_pull_policy.clone(),
            command: Some(vec!["tail".into(), "-f".into(), "/dev/null".into()]),
            env: Some(client_env(options)),
            resources: resource_requirements(&spec.container),
            volume_mounts: Some(mounts),
            ..Default::default()
        };
        let template = pod_template(
            cluster,
            ComponentType::Climc,
            spec,
            node_selector(spec),
            vec![container],
            volumes,
        );
        Ok(Workload::Deployment(deployment(
            cluster,
            ComponentType::Climc,
            spec,
            template,
        )))
    }
}
