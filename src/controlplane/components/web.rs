//! Web front
//!
//! nginx serving the dashboard and proxying the API gateway and web
//! console. It is the only component exposed on standard ports.

use super::ComponentDriver;
use crate::controlplane::builder::{
    component_address, config_map, config_volumes, deployment, node_port_service, node_selector,
    pod_template, resolve_image, resource_requirements, NamedPort, Workload,
};
use crate::controlplane::constants::{
    APIGATEWAY_PORT, CERT_DIR, CERT_FILE, KEY_FILE, WEBCONSOLE_PORT, WEB_HTTPS_PORT, WEB_HTTP_PORT,
};
use crate::controlplane::options::{scheme, ServiceOptions, ServiceProfile};
use crate::crd::OnecloudCluster;
use crate::domain::ports::ComponentType;
use crate::error::Result;
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, Probe, Service, TCPSocketAction,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

const TLS_PORTS: [NamedPort; 2] = [
    NamedPort::new("https", WEB_HTTPS_PORT),
    NamedPort::new("http", WEB_HTTP_PORT),
];

const PLAIN_PORTS: [NamedPort; 1] = [NamedPort::new("http", WEB_HTTP_PORT)];

/// Ports nginx listens on; the first one serves the site
fn ports(cluster: &OnecloudCluster) -> &'static [NamedPort] {
    if cluster.spec.enable_tls {
        &TLS_PORTS
    } else {
        &PLAIN_PORTS
    }
}

const NGINX_CONF_KEY: &str = "default.conf";
const NGINX_CONF_DIR: &str = "/etc/nginx/conf.d";

pub struct WebDriver;

/// nginx site configuration for a cluster
pub fn nginx_config(cluster: &OnecloudCluster) -> String {
    let tls = cluster.spec.enable_tls;
    let upstream = |component, port| {
        format!("{}://{}:{}", scheme(tls), component_address(cluster, component), port)
    };
    let apigateway = upstream(ComponentType::ApiGateway, APIGATEWAY_PORT);
    let webconsole = upstream(ComponentType::Webconsole, WEBCONSOLE_PORT);

    let locations = format!(
        r#"    location / {{
        root /usr/share/nginx/html/web;
        try_files $uri $uri/ /index.html;
    }}

    location /api/ {{
        proxy_pass {apigateway}/;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    }}

    location /web-console/ {{
        proxy_pass {webconsole}/;
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
    }}
"#
    );

    if tls {
        format!(
            r#"server {{
    listen {WEB_HTTP_PORT};
    return 301 https://$host$request_uri;
}}

server {{
    listen {WEB_HTTPS_PORT} ssl;
    ssl_certificate {CERT_DIR}/{CERT_FILE};
    ssl_certificate_key {CERT_DIR}/{KEY_FILE};

{locations}}}
"#
        )
    } else {
        format!(
            r#"server {{
    listen {WEB_HTTP_PORT};

{locations}}}
"#
        )
    }
}

impl ComponentDriver for WebDriver {
    fn component_type(&self) -> ComponentType {
        ComponentType::Web
    }

    fn profile(&self) -> ServiceProfile {
        ServiceProfile::new(ComponentType::Web, WEB_HTTPS_PORT)
    }

    fn config_map(
        &self,
        cluster: &OnecloudCluster,
        _options: &ServiceOptions,
    ) -> Result<Option<ConfigMap>> {
        let data = BTreeMap::from([(NGINX_CONF_KEY.to_string(), nginx_config(cluster))]);
        Ok(Some(config_map(cluster, ComponentType::Web, data)))
    }

    fn workload(&self, cluster: &OnecloudCluster, _options: &ServiceOptions) -> Result<Workload> {
        let spec = &cluster.spec.web;
        let ports = ports(cluster);

        // Certificates from the shared helper, site config in nginx's own dir
        let (shared_volumes, shared_mounts) = config_volumes(cluster, ComponentType::Web);
        let mut volumes = vec![Volume {
            name: "config".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(cluster.component_name(ComponentType::Web)),
                ..Default::default()
            }),
            ..Default::default()
        }];
        let mut mounts = vec![VolumeMount {
            name: "config".to_string(),
            mount_path: NGINX_CONF_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        }];
        for (volume, mount) in shared_volumes.into_iter().zip(shared_mounts) {
            if mount.mount_path == CERT_DIR {
                volumes.push(volume);
                mounts.push(mount);
            }
        }

        let container = Container {
            name: ComponentType::Web.to_string(),
            image: Some(resolve_image(cluster, ComponentType::Web, &spec.container)),
            image_pull_policy: spec.container.image_pull_policy.clone(),
            ports: Some(
                ports
                    .iter()
                    .map(|p| ContainerPort {
                        name: Some(p.name.to_string()),
                        container_port: i32::from(p.port),
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            readiness_probe: Some(Probe {
                tcp_socket: Some(TCPSocketAction {
                    port: IntOrString::Int(i32::from(ports[0].port)),
                    host: None,
                }),
                period_seconds: Some(10),
                ..Default::default()
            }),
            resources: resource_requirements(&spec.container),
            volume_mounts: Some(mounts),
            ..Default::default()
        };

        let template = pod_template(
            cluster,
            ComponentType::Web,
            spec,
            node_selector(spec),
            vec![container],
            volumes,
        );
        Ok(Workload::Deployment(deployment(
            cluster,
            ComponentType::Web,
            spec,
            template,
        )))
    }

    fn service(&self, cluster: &OnecloudCluster) -> Option<Service> {
        Some(node_port_service(cluster, ComponentType::Web, ports(cluster)))
    }
}
