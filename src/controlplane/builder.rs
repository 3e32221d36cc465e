//! Resource Builder
//!
//! Pure functions turning the cluster spec and rendered options into
//! Kubernetes manifests. Nothing here reads live state: identical inputs
//! always yield identical manifests, which is what lets convergence detect
//! "already applied" by comparison.

use crate::controlplane::constants::{
    BIN_DIR, CERT_DIR, CONFIG_DIR, CONFIG_MAP_KEY, DATA_DIR, DEFAULT_VOLUME_SIZE,
    HOST_WORKING_DIR, LABEL_COMPONENT, LABEL_HOST_DEPLOYER, LABEL_HOST_ENABLE,
    LABEL_HOST_ENABLE_VALUE, LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_NAME, LABEL_NAME_VALUE,
    MANAGER_NAME,
};
use crate::controlplane::options::ServiceOptions;
use crate::crd::{ContainerSpec, DeploymentSpec, OnecloudCluster, StatefulDeploymentSpec};
use crate::domain::ports::{ComponentType, ResourceKind};
use crate::error::Result;
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetSpec, Deployment, DeploymentSpec as WorkloadSpec,
};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, HostPathVolumeSource, KeyToPath,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource,
    PodSpec, PodTemplateSpec, Probe, ResourceRequirements, SecretVolumeSource, SecurityContext,
    Service, ServicePort, ServiceSpec, TCPSocketAction, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::Resource;
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// Workload
// =============================================================================

/// The pod controller of one component
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    /// Replica-managed
    Deployment(Deployment),
    /// One pod per eligible node
    DaemonSet(DaemonSet),
}

impl Workload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Workload::Deployment(_) => ResourceKind::Deployment,
            Workload::DaemonSet(_) => ResourceKind::DaemonSet,
        }
    }

    pub fn name(&self) -> String {
        let meta = match self {
            Workload::Deployment(d) => &d.metadata,
            Workload::DaemonSet(d) => &d.metadata,
        };
        meta.name.clone().unwrap_or_default()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Workload::Deployment(d) => serde_json::to_value(d)?,
            Workload::DaemonSet(d) => serde_json::to_value(d)?,
        })
    }

    pub fn pod_spec(&self) -> Option<&PodSpec> {
        match self {
            Workload::Deployment(d) => d.spec.as_ref().and_then(|s| s.template.spec.as_ref()),
            Workload::DaemonSet(d) => d.spec.as_ref().and_then(|s| s.template.spec.as_ref()),
        }
    }
}

/// A named container/service port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedPort {
    pub name: &'static str,
    pub port: u16,
}

impl NamedPort {
    pub const fn new(name: &'static str, port: u16) -> Self {
        Self { name, port }
    }
}

// =============================================================================
// Naming & Metadata
// =============================================================================

/// Labels carried by every object of a component
pub fn component_labels(cluster: &OnecloudCluster, component: ComponentType) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), LABEL_NAME_VALUE.to_string()),
        (LABEL_INSTANCE.to_string(), cluster.cluster_name()),
        (LABEL_COMPONENT.to_string(), component.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGER_NAME.to_string()),
    ])
}

/// In-cluster DNS name of a component's service
pub fn component_address(cluster: &OnecloudCluster, component: ComponentType) -> String {
    format!(
        "{}.{}.svc",
        cluster.component_name(component),
        cluster.cluster_namespace()
    )
}

/// Metadata of an object owned by the cluster
pub fn object_meta(cluster: &OnecloudCluster, component: ComponentType) -> ObjectMeta {
    ObjectMeta {
        name: Some(cluster.component_name(component)),
        namespace: Some(cluster.cluster_namespace()),
        labels: Some(component_labels(cluster, component)),
        owner_references: cluster.controller_owner_ref(&()).map(|oref| vec![oref]),
        ..Default::default()
    }
}

/// Image reference: explicit image, else repository/name:tag with cluster defaults
pub fn resolve_image(cluster: &OnecloudCluster, component: ComponentType, spec: &ContainerSpec) -> String {
    if let Some(image) = spec.image.as_deref().filter(|i| !i.is_empty()) {
        return image.to_string();
    }

    let repository = spec
        .repository
        .as_deref()
        .filter(|r| !r.is_empty())
        .unwrap_or(&cluster.spec.image_repository);
    let name = spec
        .image_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(component.as_str());
    let tag = spec
        .tag
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| Some(cluster.spec.version.as_str()).filter(|v| !v.is_empty()))
        .unwrap_or("latest");

    if repository.is_empty() {
        format!("{}:{}", name, tag)
    } else {
        format!("{}/{}:{}", repository.trim_end_matches('/'), name, tag)
    }
}

/// Container resource requests and limits
pub fn resource_requirements(spec: &ContainerSpec) -> Option<ResourceRequirements> {
    fn quantities(req: &crate::crd::ResourceRequirement) -> Option<BTreeMap<String, Quantity>> {
        let mut out = BTreeMap::new();
        if let Some(cpu) = &req.cpu {
            out.insert("cpu".to_string(), Quantity(cpu.clone()));
        }
        if let Some(memory) = &req.memory {
            out.insert("memory".to_string(), Quantity(memory.clone()));
        }
        (!out.is_empty()).then_some(out)
    }

    let requests = spec.requests.as_ref().and_then(quantities);
    let limits = spec.limits.as_ref().and_then(quantities);
    if requests.is_none() && limits.is_none() {
        return None;
    }
    Some(ResourceRequirements {
        requests,
        limits,
        ..Default::default()
    })
}

/// Node selector of a workload; an empty map when unset
pub fn node_selector(spec: &DeploymentSpec) -> BTreeMap<String, String> {
    spec.node_selector.clone().unwrap_or_default()
}

/// Restrict scheduling to nodes enabled for the host agent. Idempotent.
pub fn inject_host_node_selector(selector: &mut BTreeMap<String, String>) {
    selector.insert(
        LABEL_HOST_ENABLE.to_string(),
        LABEL_HOST_ENABLE_VALUE.to_string(),
    );
}

// =============================================================================
// Config Bundles
// =============================================================================

/// ConfigMap holding arbitrary files
pub fn config_map(
    cluster: &OnecloudCluster,
    component: ComponentType,
    data: BTreeMap<String, String>,
) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(cluster, component),
        data: Some(data),
        ..Default::default()
    }
}

/// ConfigMap holding a service's rendered options file
pub fn service_config_map(
    cluster: &OnecloudCluster,
    component: ComponentType,
    options: &ServiceOptions,
) -> Result<ConfigMap> {
    let data = BTreeMap::from([(CONFIG_MAP_KEY.to_string(), options.to_yaml()?)]);
    Ok(config_map(cluster, component, data))
}

/// Path of the options file inside the container
pub fn config_file_path(component: ComponentType) -> String {
    format!("{}/{}.conf", CONFIG_DIR, component)
}

fn certs_secret_name(cluster: &OnecloudCluster) -> String {
    format!("{}-certs", cluster.cluster_name())
}

/// Config file and (when TLS is on) certificate volumes
pub fn config_volumes(cluster: &OnecloudCluster, component: ComponentType) -> (Vec<Volume>, Vec<VolumeMount>) {
    let mut volumes = vec![Volume {
        name: "config".to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: Some(cluster.component_name(component)),
            items: Some(vec![KeyToPath {
                key: CONFIG_MAP_KEY.to_string(),
                path: format!("{}.conf", component),
                mode: None,
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }];
    let mut mounts = vec![VolumeMount {
        name: "config".to_string(),
        mount_path: CONFIG_DIR.to_string(),
        read_only: Some(true),
        ..Default::default()
    }];

    if cluster.spec.enable_tls {
        volumes.push(Volume {
            name: "certs".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(certs_secret_name(cluster)),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: "certs".to_string(),
            mount_path: CERT_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    (volumes, mounts)
}

// =============================================================================
// Workloads
// =============================================================================

/// Main container of a cloud service
pub fn service_container(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &DeploymentSpec,
    ports: &[NamedPort],
    mounts: Vec<VolumeMount>,
) -> Container {
    Container {
        name: component.to_string(),
        image: Some(resolve_image(cluster, component, &spec.container)),
        image_pull_policy: spec.container.image_pull_policy.clone(),
        command: Some(vec![
            format!("{}/{}", BIN_DIR, component),
            "--config".to_string(),
            config_file_path(component),
        ]),
        ports: (!ports.is_empty()).then(|| {
            ports
                .iter()
                .map(|p| ContainerPort {
                    name: Some(p.name.to_string()),
                    container_port: i32::from(p.port),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                })
                .collect()
        }),
        readiness_probe: ports.first().map(|p| Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::Int(i32::from(p.port)),
                host: None,
            }),
            initial_delay_seconds: Some(5),
            period_seconds: Some(10),
            ..Default::default()
        }),
        resources: resource_requirements(&spec.container),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

/// Pod template shared by every workload of a component
pub fn pod_template(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &DeploymentSpec,
    selector: BTreeMap<String, String>,
    containers: Vec<Container>,
    volumes: Vec<Volume>,
) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(component_labels(cluster, component)),
            annotations: (!spec.annotations.is_empty()).then(|| spec.annotations.clone()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers,
            volumes: Some(volumes),
            node_selector: Some(selector),
            affinity: spec.affinity.clone(),
            tolerations: (!spec.tolerations.is_empty()).then(|| spec.tolerations.clone()),
            ..Default::default()
        }),
    }
}

/// Replica-managed workload around a pod template
pub fn deployment(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &DeploymentSpec,
    template: PodTemplateSpec,
) -> Deployment {
    Deployment {
        metadata: object_meta(cluster, component),
        spec: Some(WorkloadSpec {
            replicas: Some(spec.replicas),
            selector: LabelSelector {
                match_labels: Some(component_labels(cluster, component)),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Deployment of a cloud service reading its options file
pub fn cloud_service_deployment(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &DeploymentSpec,
    ports: &[NamedPort],
) -> Deployment {
    let (volumes, mounts) = config_volumes(cluster, component);
    cloud_service_deployment_with(cluster, component, spec, ports, volumes, mounts)
}

/// Deployment of a cloud service with extra volumes
pub fn cloud_service_deployment_with(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &DeploymentSpec,
    ports: &[NamedPort],
    volumes: Vec<Volume>,
    mounts: Vec<VolumeMount>,
) -> Deployment {
    let container = service_container(cluster, component, spec, ports, mounts);
    let template = pod_template(
        cluster,
        component,
        spec,
        node_selector(spec),
        vec![container],
        volumes,
    );
    deployment(cluster, component, spec, template)
}

/// Per-node workload around a pod template
pub fn daemon_set(cluster: &OnecloudCluster, component: ComponentType, template: PodTemplateSpec) -> DaemonSet {
    DaemonSet {
        metadata: object_meta(cluster, component),
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(component_labels(cluster, component)),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn host_path_volume(name: &str, path: &str) -> (Volume, VolumeMount) {
    (
        Volume {
            name: name.to_string(),
            host_path: Some(HostPathVolumeSource {
                path: path.to_string(),
                type_: None,
            }),
            ..Default::default()
        },
        VolumeMount {
            name: name.to_string(),
            mount_path: path.to_string(),
            ..Default::default()
        },
    )
}

/// Privileged per-node agent: agent and image-service containers, pinned to
/// nodes labelled for the host agent.
pub fn host_privileged_daemon_set(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &DeploymentSpec,
) -> DaemonSet {
    let (mut volumes, mut mounts) = config_volumes(cluster, component);
    for (name, path) in [
        ("opt-cloud", HOST_WORKING_DIR),
        ("var-run", "/var/run"),
        ("dev", "/dev"),
        ("sys", "/sys"),
        ("lib-modules", "/lib/modules"),
    ] {
        let (volume, mount) = host_path_volume(name, path);
        volumes.push(volume);
        mounts.push(mount);
    }

    let image = resolve_image(cluster, component, &spec.container);
    let privileged = SecurityContext {
        privileged: Some(true),
        ..Default::default()
    };
    let container = |name: String| Container {
        command: Some(vec![
            format!("{}/{}", BIN_DIR, name),
            "--config".to_string(),
            config_file_path(component),
        ]),
        name,
        image: Some(image.clone()),
        image_pull_policy: spec.container.image_pull_policy.clone(),
        resources: resource_requirements(&spec.container),
        volume_mounts: Some(mounts.clone()),
        security_context: Some(privileged.clone()),
        working_dir: Some(HOST_WORKING_DIR.to_string()),
        ..Default::default()
    };
    let containers = vec![
        container(component.to_string()),
        container(format!("{}-image", component)),
    ];

    let mut selector = node_selector(spec);
    inject_host_node_selector(&mut selector);

    let mut template = pod_template(cluster, component, spec, selector, containers, volumes);
    if let Some(meta) = template.metadata.as_mut() {
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(LABEL_HOST_DEPLOYER.to_string(), String::new());
    }

    let mut ds = daemon_set(cluster, component, template);
    if let Some(ds_spec) = ds.spec.as_mut() {
        ds_spec
            .selector
            .match_labels
            .get_or_insert_with(BTreeMap::new)
            .insert(LABEL_HOST_DEPLOYER.to_string(), String::new());
    }
    ds
}

// =============================================================================
// Network Endpoints
// =============================================================================

/// NodePort service exposing each port on the same node port
pub fn node_port_service(cluster: &OnecloudCluster, component: ComponentType, ports: &[NamedPort]) -> Service {
    Service {
        metadata: object_meta(cluster, component),
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            selector: Some(component_labels(cluster, component)),
            ports: Some(
                ports
                    .iter()
                    .map(|p| ServicePort {
                        name: Some(p.name.to_string()),
                        protocol: Some("TCP".to_string()),
                        port: i32::from(p.port),
                        target_port: Some(IntOrString::Int(i32::from(p.port))),
                        // Ports outside the node port range are left to the platform
                        node_port: (30000..=32767)
                            .contains(&p.port)
                            .then(|| i32::from(p.port)),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// =============================================================================
// Persistent Volumes
// =============================================================================

/// Data volume claim of a stateful component
pub fn persistent_volume_claim(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &StatefulDeploymentSpec,
) -> PersistentVolumeClaim {
    let size = spec
        .base
        .container
        .requests
        .as_ref()
        .and_then(|r| r.storage.clone())
        .unwrap_or_else(|| DEFAULT_VOLUME_SIZE.to_string());

    PersistentVolumeClaim {
        metadata: object_meta(cluster, component),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: spec.storage_class_name.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([("storage".to_string(), Quantity(size))])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Volume and mount binding a component's claim to its data directory
pub fn data_volume(cluster: &OnecloudCluster, component: ComponentType) -> (Volume, VolumeMount) {
    (
        Volume {
            name: "data".to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: cluster.component_name(component),
                read_only: None,
            }),
            ..Default::default()
        },
        VolumeMount {
            name: "data".to_string(),
            mount_path: format!("{}/{}", DATA_DIR, component),
            ..Default::default()
        },
    )
}

/// Deployment of a stateful cloud service with its data volume mounted
pub fn stateful_service_deployment(
    cluster: &OnecloudCluster,
    component: ComponentType,
    spec: &StatefulDeploymentSpec,
    ports: &[NamedPort],
) -> Deployment {
    let (mut volumes, mut mounts) = config_volumes(cluster, component);
    let (volume, mount) = data_volume(cluster, component);
    volumes.push(volume);
    mounts.push(mount);
    let mut deploy =
        cloud_service_deployment_with(cluster, component, &spec.base, ports, volumes, mounts);
    // A ReadWriteOnce claim cannot be shared by a surge pod
    if let Some(s) = deploy.spec.as_mut() {
        s.strategy = Some(k8s_openapi::api::apps::v1::DeploymentStrategy {
            type_: Some("Recreate".to_string()),
            rolling_update: None,
        });
    }
    deploy
}

/// Name of a built manifest
pub fn manifest_name<K: Resource>(obj: &K) -> &str {
    obj.meta().name.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::options::tests::test_cluster;
    use crate::crd::ResourceRequirement;

    #[test]
    fn test_object_naming() {
        let cluster = test_cluster();
        let meta = object_meta(&cluster, ComponentType::Region);
        assert_eq!(meta.name.as_deref(), Some("demo-region"));
        assert_eq!(meta.namespace.as_deref(), Some("onecloud"));
        let labels = meta.labels.unwrap();
        assert_eq!(labels[LABEL_COMPONENT], "region");
        assert_eq!(labels[LABEL_INSTANCE], "demo");
        assert_eq!(
            component_address(&cluster, ComponentType::Keystone),
            "demo-keystone.onecloud.svc"
        );
    }

    #[test]
    fn test_resolve_image() {
        let cluster = test_cluster();
        let mut spec = ContainerSpec::default();
        assert_eq!(
            resolve_image(&cluster, ComponentType::Glance, &spec),
            "registry.example.com/yunion/glance:v3.0.0"
        );

        spec.tag = Some("v3.1.0".into());
        spec.image_name = Some("glance-ce".into());
        assert_eq!(
            resolve_image(&cluster, ComponentType::Glance, &spec),
            "registry.example.com/yunion/glance-ce:v3.1.0"
        );

        spec.image = Some("docker.io/custom/glance:dev".into());
        assert_eq!(
            resolve_image(&cluster, ComponentType::Glance, &spec),
            "docker.io/custom/glance:dev"
        );
    }

    #[test]
    fn test_unset_node_selector_is_empty_map() {
        let cluster = test_cluster();
        let deploy = cloud_service_deployment(
            &cluster,
            ComponentType::Scheduler,
            &cluster.spec.scheduler,
            &[NamedPort::new("api", 30887)],
        );
        let pod = Workload::Deployment(deploy);
        let selector = pod.pod_spec().unwrap().node_selector.as_ref().unwrap();
        assert!(selector.is_empty());
    }

    #[test]
    fn test_builder_is_deterministic() {
        let cluster = test_cluster();
        let ports = [NamedPort::new("api", 30888)];
        let a = cloud_service_deployment(&cluster, ComponentType::Region, &cluster.spec.region_server, &ports);
        let b = cloud_service_deployment(&cluster, ComponentType::Region, &cluster.spec.region_server, &ports);
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());

        let a = host_privileged_daemon_set(&cluster, ComponentType::Host, &cluster.spec.host_agent.base);
        let b = host_privileged_daemon_set(&cluster, ComponentType::Host, &cluster.spec.host_agent.base);
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }

    #[test]
    fn test_host_label_injection_is_idempotent() {
        let mut selector = BTreeMap::from([("zone".to_string(), "a".to_string())]);
        inject_host_node_selector(&mut selector);
        let once = selector.clone();
        inject_host_node_selector(&mut selector);
        assert_eq!(selector, once);
        assert_eq!(selector[LABEL_HOST_ENABLE], LABEL_HOST_ENABLE_VALUE);
        assert_eq!(selector.len(), 2);
    }

    #[test]
    fn test_host_daemon_set_is_privileged() {
        let mut cluster = test_cluster();
        cluster.spec.host_agent.base.node_selector =
            Some(BTreeMap::from([("rack".to_string(), "r1".to_string())]));
        let ds = host_privileged_daemon_set(&cluster, ComponentType::Host, &cluster.spec.host_agent.base);
        let spec = ds.spec.unwrap();
        let pod = spec.template.spec.unwrap();

        assert_eq!(pod.containers.len(), 2);
        assert_eq!(pod.containers[1].name, "host-image");
        for c in &pod.containers {
            assert_eq!(c.security_context.as_ref().unwrap().privileged, Some(true));
            assert_eq!(c.working_dir.as_deref(), Some(HOST_WORKING_DIR));
        }
        let selector = pod.node_selector.unwrap();
        assert_eq!(selector[LABEL_HOST_ENABLE], "enable");
        assert_eq!(selector["rack"], "r1");
        assert!(spec.selector.match_labels.unwrap().contains_key(LABEL_HOST_DEPLOYER));
        assert!(spec
            .template
            .metadata
            .unwrap()
            .labels
            .unwrap()
            .contains_key(LABEL_HOST_DEPLOYER));

        // The cluster spec itself is never mutated
        assert!(!cluster
            .spec
            .host_agent
            .base
            .node_selector
            .unwrap()
            .contains_key(LABEL_HOST_ENABLE));
    }

    #[test]
    fn test_node_port_service() {
        let cluster = test_cluster();
        let svc = node_port_service(
            &cluster,
            ComponentType::Keystone,
            &[NamedPort::new("public", 30500), NamedPort::new("admin", 30357)],
        );
        let ports = svc.spec.unwrap().ports.unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].node_port, Some(30500));
        assert_eq!(ports[1].port, 30357);

        let web = node_port_service(&cluster, ComponentType::Web, &[NamedPort::new("https", 443)]);
        assert_eq!(web.spec.unwrap().ports.unwrap()[0].node_port, None);
    }

    #[test]
    fn test_tls_mounts_certs() {
        let mut cluster = test_cluster();
        let (volumes, mounts) = config_volumes(&cluster, ComponentType::Logger);
        assert_eq!(volumes.len(), 2);
        assert_eq!(mounts[1].mount_path, CERT_DIR);

        cluster.spec.enable_tls = false;
        let (volumes, _) = config_volumes(&cluster, ComponentType::Logger);
        assert_eq!(volumes.len(), 1);
    }

    #[test]
    fn test_volume_claim_size_and_class() {
        let mut cluster = test_cluster();
        cluster.spec.glance.storage_class_name = Some("local-path".into());
        cluster.spec.glance.base.container.requests = Some(ResourceRequirement {
            storage: Some("100G".into()),
            ..Default::default()
        });
        let pvc = persistent_volume_claim(&cluster, ComponentType::Glance, &cluster.spec.glance);
        assert_eq!(manifest_name(&pvc), "demo-glance");
        let spec = pvc.spec.unwrap();
        assert_eq!(spec.storage_class_name.as_deref(), Some("local-path"));
        assert_eq!(
            spec.resources.unwrap().requests.unwrap()["storage"],
            Quantity("100G".into())
        );
    }

    #[test]
    fn test_resources() {
        let mut spec = ContainerSpec::default();
        assert!(resource_requirements(&spec).is_none());
        spec.limits = Some(ResourceRequirement {
            cpu: Some("2".into()),
            memory: Some("4Gi".into()),
            storage: None,
        });
        let res = resource_requirements(&spec).unwrap();
        assert!(res.requests.is_none());
        assert_eq!(res.limits.unwrap()["memory"], Quantity("4Gi".into()));
    }
}
