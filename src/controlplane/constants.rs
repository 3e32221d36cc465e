//! Well-known ports, catalog names, labels and paths of OneCloud services

// =============================================================================
// Service Ports
// =============================================================================

pub const KEYSTONE_PUBLIC_PORT: u16 = 30500;
pub const KEYSTONE_ADMIN_PORT: u16 = 30357;
pub const REGION_PORT: u16 = 30888;
pub const SCHEDULER_PORT: u16 = 30887;
pub const GLANCE_PORT: u16 = 30292;
pub const WEBCONSOLE_PORT: u16 = 30899;
pub const LOGGER_PORT: u16 = 30999;
pub const YUNIONCONF_PORT: u16 = 30889;
pub const YUNIONAGENT_PORT: u16 = 30898;
pub const KUBESERVER_PORT: u16 = 30442;
pub const APIGATEWAY_PORT: u16 = 30300;
pub const WEB_HTTPS_PORT: u16 = 443;
pub const WEB_HTTP_PORT: u16 = 80;
pub const HOST_PORT: u16 = 8885;

// =============================================================================
// Service Catalog Names
// =============================================================================

pub const SERVICE_NAME_KEYSTONE: &str = "keystone";
pub const SERVICE_TYPE_KEYSTONE: &str = "identity";
pub const SERVICE_NAME_REGION: &str = "region2";
pub const SERVICE_TYPE_REGION: &str = "compute_v2";
pub const SERVICE_NAME_SCHEDULER: &str = "scheduler";
pub const SERVICE_TYPE_SCHEDULER: &str = "scheduler";
pub const SERVICE_NAME_GLANCE: &str = "glance";
pub const SERVICE_TYPE_GLANCE: &str = "image";
pub const SERVICE_NAME_WEBCONSOLE: &str = "webconsole";
pub const SERVICE_TYPE_WEBCONSOLE: &str = "webconsole";
pub const SERVICE_NAME_LOGGER: &str = "log";
pub const SERVICE_TYPE_LOGGER: &str = "log";
pub const SERVICE_NAME_YUNIONCONF: &str = "yunionconf";
pub const SERVICE_TYPE_YUNIONCONF: &str = "yunionconf";
pub const SERVICE_NAME_YUNIONAGENT: &str = "yunionagent";
pub const SERVICE_TYPE_YUNIONAGENT: &str = "yunionagent";
pub const SERVICE_NAME_KUBESERVER: &str = "k8s";
pub const SERVICE_TYPE_KUBESERVER: &str = "k8s";
pub const SERVICE_NAME_APIGATEWAY: &str = "yunionapi";
pub const SERVICE_TYPE_APIGATEWAY: &str = "yunionapi";
pub const SERVICE_NAME_HOST: &str = "host";
pub const SERVICE_TYPE_HOST: &str = "host";

// =============================================================================
// Labels
// =============================================================================

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

pub const LABEL_NAME_VALUE: &str = "onecloud-cluster";
pub const MANAGER_NAME: &str = "onecloud-operator";

/// Node label marking nodes that run the host agent
pub const LABEL_HOST_ENABLE: &str = "onecloud.yunion.io/host";
pub const LABEL_HOST_ENABLE_VALUE: &str = "enable";

/// Pod label used for affinity against host agent pods
pub const LABEL_HOST_DEPLOYER: &str = "onecloud.yunion.io/host-deployer";

// =============================================================================
// Identity Defaults
// =============================================================================

pub const SYSADMIN_USER: &str = "sysadmin";
pub const SYSADMIN_PROJECT: &str = "system";
pub const DEFAULT_DOMAIN: &str = "Default";

// =============================================================================
// Container Paths
// =============================================================================

pub const BIN_DIR: &str = "/opt/yunion/bin";
pub const CONFIG_DIR: &str = "/etc/yunion";
pub const CERT_DIR: &str = "/etc/yunion/pki";
pub const DATA_DIR: &str = "/opt/cloud/workspace/data";
pub const HOST_WORKING_DIR: &str = "/opt/cloud";

pub const CERT_FILE: &str = "service.crt";
pub const KEY_FILE: &str = "service.key";
pub const CA_FILE: &str = "ca.crt";

/// ConfigMap key holding the rendered options file
pub const CONFIG_MAP_KEY: &str = "config";

pub const DEFAULT_VOLUME_SIZE: &str = "10G";
