//! In-memory orchestration platform
//!
//! Backs standalone runs and tests. Objects are stored as JSON, patched with
//! RFC 7386 merge semantics, and workloads report a finished rollout unless
//! rollouts are held.

use crate::domain::ports::{PlatformClient, ResourceKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::debug;

type ObjectKey = (ResourceKind, String, String);

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<ObjectKey, Value>,
    mutations: u64,
    failing: BTreeSet<String>,
    hold_rollout: bool,
    next_uid: u64,
}

/// Platform adapter keeping every object in process memory
#[derive(Debug)]
pub struct MemoryPlatform {
    state: RwLock<MemoryState>,
    /// Nodes a per-node workload schedules on
    node_count: i32,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::with_nodes(1)
    }

    pub fn with_nodes(node_count: i32) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            node_count,
        }
    }

    /// Successful create and patch calls so far
    pub async fn mutation_count(&self) -> u64 {
        self.state.read().await.mutations
    }

    /// Make every write to objects with this name fail
    pub async fn fail_writes_for(&self, name: &str) {
        self.state.write().await.failing.insert(name.to_string());
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failing.clear();
    }

    /// Keep workloads reporting an unfinished rollout
    pub async fn hold_rollouts(&self, hold: bool) {
        self.state.write().await.hold_rollout = hold;
    }

    /// Mark every workload as fully rolled out
    pub async fn complete_rollouts(&self) {
        let mut state = self.state.write().await;
        let nodes = self.node_count;
        for ((kind, _, _), obj) in state.objects.iter_mut() {
            finish_rollout(*kind, obj, nodes);
        }
    }

    /// Snapshot of a stored object
    pub async fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of stored objects of a kind
    pub async fn count(&self, kind: ResourceKind) -> usize {
        self.state
            .read()
            .await
            .objects
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    fn check_writable(state: &MemoryState, name: &str) -> Result<()> {
        if state.failing.contains(name) {
            return Err(Error::Internal(format!("injected write failure for {}", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for MemoryPlatform {
    async fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>> {
        Ok(self.object(kind, namespace, name).await)
    }

    async fn create(&self, kind: ResourceKind, namespace: &str, manifest: &Value) -> Result<Value> {
        let name = manifest
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Internal("manifest without a name".to_string()))?
            .to_string();

        let mut state = self.state.write().await;
        Self::check_writable(&state, &name)?;

        let key = (kind, namespace.to_string(), name.clone());
        if state.objects.contains_key(&key) {
            return Err(Error::Internal(format!("{} {}/{} already exists", kind, namespace, name)));
        }

        state.next_uid += 1;
        let mut obj = manifest.clone();
        if let Some(meta) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.insert("namespace".to_string(), json!(namespace));
            meta.insert("uid".to_string(), json!(format!("mem-{}", state.next_uid)));
            meta.insert("generation".to_string(), json!(1));
        }
        if !state.hold_rollout {
            finish_rollout(kind, &mut obj, self.node_count);
        }

        state.mutations += 1;
        state.objects.insert(key, obj.clone());
        debug!(kind = %kind, name = %name, "memory create");
        Ok(obj)
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        let mut state = self.state.write().await;
        Self::check_writable(&state, name)?;

        let hold = state.hold_rollout;
        let obj = state
            .objects
            .get_mut(&(kind, namespace.to_string(), name.to_string()))
            .ok_or_else(|| Error::ResourceNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })?;

        let spec_before = obj.get("spec").cloned();
        merge_patch(obj, patch);
        if obj.get("spec").cloned() != spec_before {
            let generation = obj.pointer("/metadata/generation").and_then(Value::as_i64).unwrap_or(0);
            if let Some(meta) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
                meta.insert("generation".to_string(), json!(generation + 1));
            }
        }
        if !hold {
            finish_rollout(kind, obj, self.node_count);
        }

        let out = obj.clone();
        state.mutations += 1;
        debug!(kind = %kind, name = %name, "memory patch");
        Ok(out)
    }

    fn platform_name(&self) -> &str {
        "memory"
    }
}

/// Apply an RFC 7386 JSON merge patch in place
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn finish_rollout(kind: ResourceKind, obj: &mut Value, nodes: i32) {
    let generation = obj.pointer("/metadata/generation").and_then(Value::as_i64).unwrap_or(1);
    let status = match kind {
        ResourceKind::Deployment => {
            let replicas = obj.pointer("/spec/replicas").and_then(Value::as_i64).unwrap_or(1);
            json!({
                "observedGeneration": generation,
                "replicas": replicas,
                "readyReplicas": replicas,
                "updatedReplicas": replicas,
                "availableReplicas": replicas,
            })
        }
        ResourceKind::DaemonSet => json!({
            "observedGeneration": generation,
            "desiredNumberScheduled": nodes,
            "numberReady": nodes,
            "updatedNumberScheduled": nodes,
            "numberAvailable": nodes,
        }),
        _ => return,
    };
    if let Some(obj) = obj.as_object_mut() {
        obj.insert("status".to_string(), status);
    }
}
