//! Domain Ports - Core trait definitions for the operator
//!
//! These traits define the boundaries between the reconciliation engine and
//! the systems it drives: the orchestration platform holding the workloads,
//! and the service catalog the platform services discover each other through.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// Component Types
// =============================================================================

/// One independently deployable OneCloud service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Keystone,
    Region,
    Scheduler,
    Glance,
    Climc,
    Webconsole,
    Logger,
    Yunionconf,
    Yunionagent,
    KubeServer,
    ApiGateway,
    Web,
    Host,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Keystone => "keystone",
            ComponentType::Region => "region",
            ComponentType::Scheduler => "scheduler",
            ComponentType::Glance => "glance",
            ComponentType::Climc => "climc",
            ComponentType::Webconsole => "webconsole",
            ComponentType::Logger => "logger",
            ComponentType::Yunionconf => "yunionconf",
            ComponentType::Yunionagent => "yunionagent",
            ComponentType::KubeServer => "kubeserver",
            ComponentType::ApiGateway => "apigateway",
            ComponentType::Web => "web",
            ComponentType::Host => "host",
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Orchestration Platform Port
// =============================================================================

/// Resource kinds the engine converges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ConfigMap,
    Deployment,
    DaemonSet,
    Service,
    PersistentVolumeClaim,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Service => "Service",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
        }
    }

    /// Whether an existing object may be patched after creation.
    /// Volume claim specs are immutable once bound.
    pub fn is_patchable(&self) -> bool {
        !matches!(self, ResourceKind::PersistentVolumeClaim)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port for the orchestration platform API.
///
/// Objects are exchanged as JSON so one adapter serves every kind; callers
/// serialize typed `k8s-openapi` manifests in and deserialize status out.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch a live object, `None` when absent
    async fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>>;

    /// Create an object from a full manifest
    async fn create(&self, kind: ResourceKind, namespace: &str, manifest: &Value) -> Result<Value>;

    /// Apply a JSON merge patch to an existing object
    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value>;

    /// Adapter name for logging
    fn platform_name(&self) -> &str;
}

// =============================================================================
// Service Catalog Port
// =============================================================================

/// Catalog endpoint interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointInterface {
    Internal,
    Public,
    Admin,
}

impl std::fmt::Display for EndpointInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointInterface::Internal => write!(f, "internal"),
            EndpointInterface::Public => write!(f, "public"),
            EndpointInterface::Admin => write!(f, "admin"),
        }
    }
}

/// A reachable endpoint registered under a logical service name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCatalogEntry {
    pub service_name: String,
    pub service_type: String,
    pub interface: EndpointInterface,
    pub region: String,
    pub url: String,
}

/// What an upsert did at the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Port for the shared service catalog.
///
/// Registrars only ever create or update; entries are keyed by
/// (service name, interface) and never deleted during reconciliation.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Make sure a service record exists
    async fn ensure_service(&self, service_name: &str, service_type: &str)
        -> Result<UpsertOutcome>;

    /// Create or update an endpoint, creating its service record if needed
    async fn upsert_endpoint(&self, entry: &ServiceCatalogEntry) -> Result<UpsertOutcome>;

    /// Adapter name for logging
    fn catalog_name(&self) -> &str;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type PlatformClientRef = Arc<dyn PlatformClient>;
pub type ServiceCatalogRef = Arc<dyn ServiceCatalog>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_display() {
        assert_eq!(format!("{}", ComponentType::Keystone), "keystone");
        assert_eq!(format!("{}", ComponentType::KubeServer), "kubeserver");
        assert_eq!(format!("{}", ComponentType::ApiGateway), "apigateway");
    }

    #[test]
    fn test_volume_claims_are_create_only() {
        assert!(ResourceKind::Deployment.is_patchable());
        assert!(ResourceKind::ConfigMap.is_patchable());
        assert!(!ResourceKind::PersistentVolumeClaim.is_patchable());
    }

    #[test]
    fn test_interface_display() {
        assert_eq!(EndpointInterface::Internal.to_string(), "internal");
        assert_eq!(EndpointInterface::Admin.to_string(), "admin");
    }
}
