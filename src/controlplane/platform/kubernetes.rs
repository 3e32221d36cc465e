//! Kubernetes Platform Adapter
//!
//! Talks to the API server through kube's dynamic API so one adapter
//! serves every converged kind.

use crate::controlplane::constants::MANAGER_NAME;
use crate::domain::ports::{PlatformClient, ResourceKind};
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::Value;
use tracing::debug;

/// Platform adapter backed by a Kubernetes API server
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
    field_manager: String,
}

impl KubePlatform {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: MANAGER_NAME.to_string(),
        }
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource(kind))
    }
}

/// Type information of a converged kind
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    match kind {
        ResourceKind::ConfigMap => ApiResource::erase::<ConfigMap>(&()),
        ResourceKind::Deployment => ApiResource::erase::<Deployment>(&()),
        ResourceKind::DaemonSet => ApiResource::erase::<DaemonSet>(&()),
        ResourceKind::Service => ApiResource::erase::<Service>(&()),
        ResourceKind::PersistentVolumeClaim => ApiResource::erase::<PersistentVolumeClaim>(&()),
    }
}

#[async_trait]
impl PlatformClient for KubePlatform {
    async fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>> {
        let obj = self.api(kind, namespace).get_opt(name).await?;
        Ok(obj.map(serde_json::to_value).transpose()?)
    }

    async fn create(&self, kind: ResourceKind, namespace: &str, manifest: &Value) -> Result<Value> {
        let obj: DynamicObject = serde_json::from_value(manifest.clone())?;
        let params = PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        debug!(kind = %kind, namespace = %namespace, "kube create");
        let created = self.api(kind, namespace).create(&params, &obj).await?;
        Ok(serde_json::to_value(created)?)
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        debug!(kind = %kind, namespace = %namespace, name = %name, "kube merge patch");
        let patched = self
            .api(kind, namespace)
            .patch(name, &params, &Patch::Merge(patch))
            .await?;
        Ok(serde_json::to_value(patched)?)
    }

    fn platform_name(&self) -> &str {
        "kubernetes"
    }
}
