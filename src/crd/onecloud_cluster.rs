//! OnecloudCluster CRD
//!
//! The desired state of a whole OneCloud deployment: shared infrastructure
//! (MySQL, etcd), cluster identity (region, zone, registry, load balancer)
//! and one sub-record per platform service.

use crate::domain::ports::ComponentType;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Affinity, Toleration};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// OnecloudCluster CRD
// =============================================================================

/// OnecloudCluster describes every service of one OneCloud platform cluster.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "onecloud.yunion.io",
    version = "v1alpha1",
    kind = "OnecloudCluster",
    plural = "onecloudclusters",
    shortname = "oc",
    status = "OnecloudClusterStatus",
    printcolumn = r#"{"name": "Version", "type": "string", "jsonPath": ".spec.version"}"#,
    printcolumn = r#"{"name": "Region", "type": "string", "jsonPath": ".spec.region"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OnecloudClusterSpec {
    /// External etcd cluster
    #[serde(default)]
    pub etcd: Etcd,

    /// External MySQL server, also the default database credential
    #[serde(default)]
    pub mysql: Mysql,

    /// OneCloud release, used as default image tag
    #[serde(default)]
    pub version: String,

    /// Extra subject alternative names for the cluster signing cert
    #[serde(default)]
    pub cert_sans: Vec<String>,

    /// Default image registry
    #[serde(default)]
    pub image_repository: String,

    /// Cluster region
    #[serde(default = "default_region")]
    pub region: String,

    /// First zone of the region
    #[serde(default = "default_zone")]
    pub zone: String,

    /// Upstream load balancer virtual IP or DNS name
    #[serde(default)]
    pub load_balancer_endpoint: String,

    /// Serve every component over TLS
    #[serde(default = "default_true")]
    pub enable_tls: bool,

    #[serde(default)]
    pub keystone: KeystoneSpec,

    #[serde(default)]
    pub region_server: DeploymentSpec,

    #[serde(default)]
    pub scheduler: DeploymentSpec,

    #[serde(default)]
    pub glance: StatefulDeploymentSpec,

    #[serde(default)]
    pub climc: DeploymentSpec,

    #[serde(default)]
    pub webconsole: DeploymentSpec,

    #[serde(default)]
    pub logger: DeploymentSpec,

    #[serde(default)]
    pub yunionconf: DeploymentSpec,

    #[serde(default)]
    pub yunionagent: StatefulDeploymentSpec,

    #[serde(default, rename = "kubeserver")]
    pub kube_server: DeploymentSpec,

    #[serde(default)]
    pub api_gateway: DeploymentSpec,

    #[serde(default)]
    pub web: DeploymentSpec,

    #[serde(default)]
    pub host_agent: HostAgentSpec,

    /// Per-component configuration overrides
    #[serde(default)]
    pub config: ClusterConfig,
}

// =============================================================================
// Infrastructure Dependencies
// =============================================================================

/// External etcd cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Etcd {
    /// Client URLs of the etcd members
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// CA certificate data
    #[serde(default)]
    pub ca: String,
    /// Client certificate data
    #[serde(default)]
    pub cert: String,
    /// Client key data
    #[serde(default)]
    pub key: String,
}

/// External MySQL server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mysql {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: i32,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Default for Mysql {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_mysql_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

// =============================================================================
// Component Specs
// =============================================================================

/// Container image and resource settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Full image reference; wins over repository/imageName/tag
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub image_pull_policy: Option<String>,
    #[serde(default)]
    pub requests: Option<ResourceRequirement>,
    #[serde(default)]
    pub limits: Option<ResourceRequirement>,
}

/// Resource quantities, e.g. `cpu: 500m`, `memory: 1Gi`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirement {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
}

/// Settings shared by every replica-managed or per-node service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    #[serde(flatten)]
    pub container: ContainerSpec,

    /// Exclude this component from convergence
    #[serde(default)]
    pub disable: bool,

    #[serde(default = "default_replicas")]
    pub replicas: i32,

    #[serde(default)]
    pub affinity: Option<Affinity>,

    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub tolerations: Vec<Toleration>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Default for DeploymentSpec {
    fn default() -> Self {
        Self {
            container: ContainerSpec::default(),
            disable: false,
            replicas: default_replicas(),
            affinity: None,
            node_selector: None,
            tolerations: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

/// A service that keeps data on a persistent volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatefulDeploymentSpec {
    #[serde(flatten)]
    pub base: DeploymentSpec,

    #[serde(default)]
    pub storage_class_name: Option<String>,
}

/// Identity service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeystoneSpec {
    #[serde(flatten)]
    pub base: DeploymentSpec,

    /// Password of the bootstrap admin user
    #[serde(default)]
    pub bootstrap_password: String,
}

/// Per-node host agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostAgentSpec {
    #[serde(flatten)]
    pub base: DeploymentSpec,
}

// =============================================================================
// Per-Component Configuration Overrides
// =============================================================================

/// Database owned by one component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DbConfig {
    pub database: String,
    pub username: String,
    pub password: String,
}

/// Service account a component authenticates to keystone with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudUser {
    pub username: String,
    pub password: String,
}

/// Overrides for one component's rendered options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default)]
    pub db: Option<DbConfig>,

    #[serde(default)]
    pub cloud_user: Option<CloudUser>,
}

/// Overrides keyed by component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default)]
    pub keystone: ServiceConfig,
    #[serde(default)]
    pub region_server: ServiceConfig,
    #[serde(default)]
    pub scheduler: ServiceConfig,
    #[serde(default)]
    pub glance: ServiceConfig,
    #[serde(default)]
    pub climc: ServiceConfig,
    #[serde(default)]
    pub webconsole: ServiceConfig,
    #[serde(default)]
    pub logger: ServiceConfig,
    #[serde(default)]
    pub yunionconf: ServiceConfig,
    #[serde(default)]
    pub yunionagent: ServiceConfig,
    #[serde(default, rename = "kubeserver")]
    pub kube_server: ServiceConfig,
    #[serde(default)]
    pub api_gateway: ServiceConfig,
    #[serde(default)]
    pub web: ServiceConfig,
    #[serde(default)]
    pub host_agent: ServiceConfig,
}

impl ClusterConfig {
    /// Overrides for one component
    pub fn get(&self, component: ComponentType) -> &ServiceConfig {
        match component {
            ComponentType::Keystone => &self.keystone,
            ComponentType::Region => &self.region_server,
            ComponentType::Scheduler => &self.scheduler,
            ComponentType::Glance => &self.glance,
            ComponentType::Climc => &self.climc,
            ComponentType::Webconsole => &self.webconsole,
            ComponentType::Logger => &self.logger,
            ComponentType::Yunionconf => &self.yunionconf,
            ComponentType::Yunionagent => &self.yunionagent,
            ComponentType::KubeServer => &self.kube_server,
            ComponentType::ApiGateway => &self.api_gateway,
            ComponentType::Web => &self.web,
            ComponentType::Host => &self.host_agent,
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Rollout state of a component or of the whole cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Phase {
    Normal,
    Upgrade,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Normal => write!(f, "Normal"),
            Phase::Upgrade => write!(f, "Upgrade"),
        }
    }
}

/// Last observed replica counts of a component workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    /// Generation of the workload spec as last written
    #[serde(default)]
    pub generation: i64,
    /// Generation the workload controller has acted on
    #[serde(default)]
    pub observed_generation: i64,
    /// Desired replicas (scheduled pods for per-node workloads)
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub updated_replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
}

/// Observed state of one component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Unset until the component converges once
    #[serde(default)]
    pub phase: Option<Phase>,

    #[serde(default)]
    pub workload: Option<WorkloadStatus>,
}

/// Status of the OnecloudCluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnecloudClusterStatus {
    #[serde(default)]
    pub cluster_id: Option<String>,

    /// Worst phase among enabled components
    #[serde(default)]
    pub phase: Option<Phase>,

    #[serde(default)]
    pub keystone: ComponentStatus,
    #[serde(default)]
    pub region_server: ComponentStatus,
    #[serde(default)]
    pub scheduler: ComponentStatus,
    #[serde(default)]
    pub glance: ComponentStatus,
    #[serde(default)]
    pub climc: ComponentStatus,
    #[serde(default)]
    pub webconsole: ComponentStatus,
    #[serde(default)]
    pub logger: ComponentStatus,
    #[serde(default)]
    pub yunionconf: ComponentStatus,
    #[serde(default)]
    pub yunionagent: ComponentStatus,
    #[serde(default, rename = "kubeserver")]
    pub kube_server: ComponentStatus,
    #[serde(default)]
    pub api_gateway: ComponentStatus,
    #[serde(default)]
    pub web: ComponentStatus,
    #[serde(default)]
    pub host_agent: ComponentStatus,

    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_reconcile_time: Option<DateTime<Utc>>,
}

impl OnecloudClusterStatus {
    /// Status record of one component
    pub fn component(&self, component: ComponentType) -> &ComponentStatus {
        match component {
            ComponentType::Keystone => &self.keystone,
            ComponentType::Region => &self.region_server,
            ComponentType::Scheduler => &self.scheduler,
            ComponentType::Glance => &self.glance,
            ComponentType::Climc => &self.climc,
            ComponentType::Webconsole => &self.webconsole,
            ComponentType::Logger => &self.logger,
            ComponentType::Yunionconf => &self.yunionconf,
            ComponentType::Yunionagent => &self.yunionagent,
            ComponentType::KubeServer => &self.kube_server,
            ComponentType::ApiGateway => &self.api_gateway,
            ComponentType::Web => &self.web,
            ComponentType::Host => &self.host_agent,
        }
    }

    /// Writable status record of one component
    pub fn component_mut(&mut self, component: ComponentType) -> &mut ComponentStatus {
        match component {
            ComponentType::Keystone => &mut self.keystone,
            ComponentType::Region => &mut self.region_server,
            ComponentType::Scheduler => &mut self.scheduler,
            ComponentType::Glance => &mut self.glance,
            ComponentType::Climc => &mut self.climc,
            ComponentType::Webconsole => &mut self.webconsole,
            ComponentType::Logger => &mut self.logger,
            ComponentType::Yunionconf => &mut self.yunionconf,
            ComponentType::Yunionagent => &mut self.yunionagent,
            ComponentType::KubeServer => &mut self.kube_server,
            ComponentType::ApiGateway => &mut self.api_gateway,
            ComponentType::Web => &mut self.web,
            ComponentType::Host => &mut self.host_agent,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.phase == Some(Phase::Normal)
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_region() -> String {
    "region0".to_string()
}

fn default_zone() -> String {
    "zone0".to_string()
}

fn default_mysql_port() -> i32 {
    3306
}

fn default_replicas() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Implementations
// =============================================================================

impl Default for OnecloudClusterSpec {
    fn default() -> Self {
        Self {
            etcd: Etcd::default(),
            mysql: Mysql::default(),
            version: String::new(),
            cert_sans: Vec::new(),
            image_repository: String::new(),
            region: default_region(),
            zone: default_zone(),
            load_balancer_endpoint: String::new(),
            enable_tls: true,
            keystone: KeystoneSpec::default(),
            region_server: DeploymentSpec::default(),
            scheduler: DeploymentSpec::default(),
            glance: StatefulDeploymentSpec::default(),
            climc: DeploymentSpec::default(),
            webconsole: DeploymentSpec::default(),
            logger: DeploymentSpec::default(),
            yunionconf: DeploymentSpec::default(),
            yunionagent: StatefulDeploymentSpec::default(),
            kube_server: DeploymentSpec::default(),
            api_gateway: DeploymentSpec::default(),
            web: DeploymentSpec::default(),
            host_agent: HostAgentSpec::default(),
            config: ClusterConfig::default(),
        }
    }
}

impl OnecloudClusterSpec {
    /// Base deployment settings of one component
    pub fn deployment(&self, component: ComponentType) -> &DeploymentSpec {
        match component {
            ComponentType::Keystone => &self.keystone.base,
            ComponentType::Region => &self.region_server,
            ComponentType::Scheduler => &self.scheduler,
            ComponentType::Glance => &self.glance.base,
            ComponentType::Climc => &self.climc,
            ComponentType::Webconsole => &self.webconsole,
            ComponentType::Logger => &self.logger,
            ComponentType::Yunionconf => &self.yunionconf,
            ComponentType::Yunionagent => &self.yunionagent.base,
            ComponentType::KubeServer => &self.kube_server,
            ComponentType::ApiGateway => &self.api_gateway,
            ComponentType::Web => &self.web,
            ComponentType::Host => &self.host_agent.base,
        }
    }

    pub fn is_disabled(&self, component: ComponentType) -> bool {
        self.deployment(component).disable
    }
}

impl OnecloudCluster {
    /// Get the name of this cluster
    pub fn cluster_name(&self) -> String {
        self.name_any()
    }

    /// Namespace of the cluster and of every managed object
    pub fn cluster_namespace(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }

    /// Name of every object belonging to one component
    pub fn component_name(&self, component: ComponentType) -> String {
        format!("{}-{}", self.cluster_name(), component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let spec = OnecloudClusterSpec::default();
        assert_eq!(spec.region, "region0");
        assert_eq!(spec.mysql.port, 3306);
        assert!(spec.enable_tls);
        assert_eq!(spec.scheduler.replicas, 1);
        assert!(spec.scheduler.node_selector.is_none());
    }

    #[test]
    fn test_flattened_component_specs() {
        let spec: OnecloudClusterSpec = serde_json::from_value(serde_json::json!({
            "mysql": {"host": "10.0.0.2", "username": "root", "password": "secret"},
            "keystone": {"replicas": 2, "bootstrapPassword": "admin@123", "image": "reg/keystone:v3"},
            "glance": {"disable": true, "storageClassName": "local-path"},
            "kubeserver": {"tag": "v3.1"}
        }))
        .unwrap();

        assert_eq!(spec.keystone.base.replicas, 2);
        assert_eq!(spec.keystone.bootstrap_password, "admin@123");
        assert_eq!(spec.keystone.base.container.image.as_deref(), Some("reg/keystone:v3"));
        assert!(spec.glance.base.disable);
        assert_eq!(spec.glance.storage_class_name.as_deref(), Some("local-path"));
        assert_eq!(spec.kube_server.container.tag.as_deref(), Some("v3.1"));
        assert!(spec.is_disabled(ComponentType::Glance));
        assert!(!spec.is_disabled(ComponentType::Region));
    }

    #[test]
    fn test_component_status_lookup() {
        let mut status = OnecloudClusterStatus::default();
        status.component_mut(ComponentType::Web).phase = Some(Phase::Upgrade);
        assert_eq!(status.web.phase, Some(Phase::Upgrade));
        assert_eq!(status.component(ComponentType::Web).phase, Some(Phase::Upgrade));
        assert_eq!(status.component(ComponentType::Keystone).phase, None);
    }

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::Upgrade > Phase::Normal);
        assert_eq!(Phase::Upgrade.to_string(), "Upgrade");
    }
}
