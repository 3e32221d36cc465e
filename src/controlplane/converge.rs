//! Convergence
//!
//! Drives one desired object onto the orchestration platform: create it when
//! absent, patch the fields the operator owns when they drifted, and leave
//! it alone otherwise. A second pass over unchanged input issues no writes.

use crate::controlplane::metrics::Metrics;
use crate::crd::WorkloadStatus;
use crate::domain::ports::{PlatformClient, ResourceKind};
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Top-level fields of a manifest the operator owns
const OWNED_FIELDS: &[&str] = &["spec", "data", "binaryData"];

/// Metadata fields the operator owns
const OWNED_METADATA: &[&str] = &["name", "namespace", "labels", "annotations", "ownerReferences"];

/// Pod template fields the operator owns outright: live keys missing from
/// the desired value are removed rather than left in place.
const REPLACED_FIELDS: &[&str] = &[
    "/spec/template/metadata/annotations",
    "/spec/template/spec/nodeSelector",
    "/spec/template/spec/tolerations",
    "/spec/template/spec/affinity",
];

const CONTAINERS: &str = "/spec/template/spec/containers";

/// What converging one object did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeOutcome {
    Created,
    Patched,
    Unchanged,
}

impl ConvergeOutcome {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ConvergeOutcome::Unchanged)
    }
}

/// Converges desired objects through a platform client
pub struct Converger<'a> {
    platform: &'a dyn PlatformClient,
    metrics: &'a Metrics,
}

impl<'a> Converger<'a> {
    pub fn new(platform: &'a dyn PlatformClient, metrics: &'a Metrics) -> Self {
        Self { platform, metrics }
    }

    /// Create-or-patch one object.
    ///
    /// Volume claims are create-only: an existing claim is never patched.
    pub async fn converge<T: Serialize>(
        &self,
        kind: ResourceKind,
        namespace: &str,
        manifest: &T,
    ) -> Result<ConvergeOutcome> {
        let desired = serde_json::to_value(manifest)?;
        let name = desired
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Internal(format!("{} manifest without a name", kind)))?
            .to_string();

        let live = self
            .platform
            .get(kind, namespace, &name)
            .await
            .map_err(|e| convergence_error(kind, &name, e))?;

        let Some(live) = live else {
            self.platform
                .create(kind, namespace, &desired)
                .await
                .map_err(|e| convergence_error(kind, &name, e))?;
            self.record(kind, "create");
            info!(kind = %kind, name = %name, "Created");
            return Ok(ConvergeOutcome::Created);
        };

        if !kind.is_patchable() {
            debug!(kind = %kind, name = %name, "Exists, create-only");
            return Ok(ConvergeOutcome::Unchanged);
        }

        let owned = owned_fields(&desired);
        if in_sync(&owned, &live) {
            debug!(kind = %kind, name = %name, "Up to date");
            return Ok(ConvergeOutcome::Unchanged);
        }

        let patch = with_removals(owned, &live);
        self.platform
            .patch(kind, namespace, &name, &patch)
            .await
            .map_err(|e| convergence_error(kind, &name, e))?;
        self.record(kind, "patch");
        info!(kind = %kind, name = %name, "Patched");
        Ok(ConvergeOutcome::Patched)
    }

    /// Read the rollout counters of a workload
    pub async fn observe_workload(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<WorkloadStatus> {
        let live = self
            .platform
            .get(kind, namespace, name)
            .await
            .map_err(|e| convergence_error(kind, name, e))?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })?;
        workload_status(kind, &live)
    }

    fn record(&self, kind: ResourceKind, verb: &str) {
        self.metrics
            .platform_mutations
            .with_label_values(&[kind.as_str(), verb])
            .inc();
    }
}

fn convergence_error(kind: ResourceKind, name: &str, err: Error) -> Error {
    match err {
        Error::Convergence { .. } => err,
        other => Error::Convergence {
            kind: kind.to_string(),
            name: name.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Project a manifest onto the fields the operator owns
pub fn owned_fields(manifest: &Value) -> Value {
    let mut out = Map::new();

    if let Some(meta) = manifest.get("metadata").and_then(Value::as_object) {
        let owned: Map<String, Value> = OWNED_METADATA
            .iter()
            .filter_map(|k| meta.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect();
        out.insert("metadata".to_string(), Value::Object(owned));
    }
    for field in OWNED_FIELDS {
        if let Some(v) = manifest.get(*field) {
            out.insert(field.to_string(), v.clone());
        }
    }

    Value::Object(out)
}

/// Whether every value in `desired` is present and equal in `live`.
///
/// Objects compare key-wise so platform defaults on the live side are
/// ignored; arrays must match element-wise. The platform drops empty maps
/// and lists, so those match an absent field.
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(k, v)| match have.get(k) {
            Some(h) => is_subset(v, h),
            None => is_empty(v),
        }),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        (want, have) => want == have,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    value.map_or(true, is_empty)
}

/// Whether the live object already carries every owned value.
///
/// Replaced fields and container resources must match exactly; everything
/// else only has to be a subset of the live object.
pub fn in_sync(owned: &Value, live: &Value) -> bool {
    let mut loose = owned.clone();
    for pointer in REPLACED_FIELDS {
        remove_pointer(&mut loose, pointer);
    }
    if let Some(containers) = loose.pointer_mut(CONTAINERS).and_then(Value::as_array_mut) {
        for container in containers.iter_mut().filter_map(Value::as_object_mut) {
            container.remove("resources");
        }
    }
    if !is_subset(&loose, live) {
        return false;
    }

    let replaced_match = REPLACED_FIELDS.iter().all(|pointer| {
        let (want, have) = (owned.pointer(pointer), live.pointer(pointer));
        (is_absent(want) && is_absent(have)) || want == have
    });
    if !replaced_match {
        return false;
    }

    let want = owned.pointer(CONTAINERS).and_then(Value::as_array);
    let have = live.pointer(CONTAINERS).and_then(Value::as_array);
    match (want, have) {
        (Some(want), Some(have)) => want
            .iter()
            .zip(have)
            .all(|(w, h)| resources_match(w.get("resources"), h.get("resources"))),
        _ => true,
    }
}

/// Add an explicit `null` for every replaced key the live object holds but
/// the desired one dropped, so a merge patch removes it.
///
/// Container lists need no such treatment: a merge patch replaces arrays.
pub fn with_removals(mut patch: Value, live: &Value) -> Value {
    for pointer in REPLACED_FIELDS {
        let Some(have) = live.pointer(pointer).filter(|v| !is_empty(v)) else {
            continue;
        };
        let value = removal_value(patch.pointer(pointer), have);
        set_pointer(&mut patch, pointer, value);
    }
    patch
}

fn removal_value(want: Option<&Value>, have: &Value) -> Value {
    match (want, have) {
        (Some(Value::Object(want)), Value::Object(have)) => {
            let mut out = Map::new();
            for (key, value) in want {
                let value = match have.get(key) {
                    Some(h) => removal_value(Some(value), h),
                    None => value.clone(),
                };
                out.insert(key.clone(), value);
            }
            for key in have.keys().filter(|k| !want.contains_key(*k)) {
                out.insert(key.clone(), Value::Null);
            }
            Value::Object(out)
        }
        (Some(want), _) if !is_empty(want) => want.clone(),
        _ => Value::Null,
    }
}

fn remove_pointer(value: &mut Value, pointer: &str) {
    if let Some((parent, key)) = pointer.rsplit_once('/') {
        if let Some(map) = value.pointer_mut(parent).and_then(Value::as_object_mut) {
            map.remove(key);
        }
    }
}

fn set_pointer(value: &mut Value, pointer: &str, new: Value) {
    let mut current = value;
    for key in pointer.split('/').skip(1) {
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
    *current = new;
}

// =============================================================================
// Quantities
// =============================================================================

/// Parse a resource quantity (`500m`, `0.5`, `1Gi`, `1e3`) into billionths
/// of its base unit. None when the string is not a quantity.
pub fn quantity_nanos(raw: &str) -> Option<i128> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);

    let (pow10, pow2): (i32, u32) = match suffix {
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "" => (0, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        exp if exp.starts_with(['e', 'E']) => (exp[1..].parse().ok()?, 0),
        _ => return None,
    };

    let (negative, digits) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.strip_prefix('+').unwrap_or(number)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mantissa: i128 = format!("{}{}", whole, fraction).parse().ok()?;
    let scale = 9 + pow10 - i32::try_from(fraction.len()).ok()?;
    let mut value = mantissa.checked_mul(1i128.checked_shl(pow2)?)?;
    if scale >= 0 {
        value = value.checked_mul(10i128.checked_pow(u32::try_from(scale).ok()?)?)?;
    } else {
        value /= 10i128.checked_pow(scale.unsigned_abs())?;
    }
    Some(if negative { -value } else { value })
}

/// Quantity strings are equal when they denote the same amount
fn quantity_eq(want: &Value, have: &Value) -> bool {
    match (want.as_str().and_then(quantity_nanos), have.as_str().and_then(quantity_nanos)) {
        (Some(w), Some(h)) => w == h,
        _ => want == have,
    }
}

/// Container resources compare exactly on their keys and semantically on
/// their quantities
fn resources_match(want: Option<&Value>, have: Option<&Value>) -> bool {
    let empty = Map::new();
    let section = |value: Option<&Value>, name: &str| -> Map<String, Value> {
        value
            .and_then(|v| v.get(name))
            .and_then(Value::as_object)
            .unwrap_or(&empty)
            .clone()
    };
    ["limits", "requests"].iter().all(|name| {
        let (want, have) = (section(want, name), section(have, name));
        want.len() == have.len()
            && want
                .iter()
                .all(|(k, w)| have.get(k).is_some_and(|h| quantity_eq(w, h)))
    })
}

fn int(value: &Value, pointer: &str) -> i64 {
    value.pointer(pointer).and_then(Value::as_i64).unwrap_or(0)
}

fn int32(value: &Value, pointer: &str) -> i32 {
    i32::try_from(int(value, pointer)).unwrap_or(i32::MAX)
}

/// Parse rollout counters from a live Deployment or DaemonSet
pub fn workload_status(kind: ResourceKind, live: &Value) -> Result<WorkloadStatus> {
    let generation = int(live, "/metadata/generation");
    let observed_generation = int(live, "/status/observedGeneration");

    match kind {
        ResourceKind::Deployment => Ok(WorkloadStatus {
            generation,
            observed_generation,
            replicas: live
                .pointer("/spec/replicas")
                .and_then(Value::as_i64)
                .map(|r| i32::try_from(r).unwrap_or(i32::MAX))
                .unwrap_or(1),
            ready_replicas: int32(live, "/status/readyReplicas"),
            updated_replicas: int32(live, "/status/updatedReplicas"),
            available_replicas: int32(live, "/status/availableReplicas"),
        }),
        ResourceKind::DaemonSet => Ok(WorkloadStatus {
            generation,
            observed_generation,
            replicas: int32(live, "/status/desiredNumberScheduled"),
            ready_replicas: int32(live, "/status/numberReady"),
            updated_replicas: int32(live, "/status/updatedNumberScheduled"),
            available_replicas: int32(live, "/status/numberAvailable"),
        }),
        other => Err(Error::Internal(format!("{} is not a workload", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::platform::MemoryPlatform;
    use serde_json::json;

    #[test]
    fn test_subset_ignores_platform_defaults() {
        let desired = json!({"spec": {"replicas": 1, "template": {"x": [1, {"a": 1}]}}});
        let live = json!({
            "spec": {"replicas": 1, "revisionHistoryLimit": 10, "template": {"x": [1, {"a": 1, "b": 2}]}},
            "status": {"readyReplicas": 1}
        });
        assert!(is_subset(&desired, &live));

        let drifted = json!({"spec": {"replicas": 2, "template": {"x": [1, {"a": 1}]}}});
        assert!(!is_subset(&drifted, &live));

        let shorter = json!({"spec": {"template": {"x": [1]}}});
        assert!(!is_subset(&shorter, &live));

        let empty_selector = json!({"spec": {"nodeSelector": {}, "tolerations": []}});
        assert!(is_subset(&empty_selector, &live));
        let selector = json!({"spec": {"nodeSelector": {"a": "b"}}});
        assert!(!is_subset(&selector, &live));
    }

    #[test]
    fn test_owned_fields_projection() {
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "demo-region", "namespace": "onecloud", "labels": {"a": "b"}},
            "data": {"config": "port: 30888\n"}
        });
        let owned = owned_fields(&manifest);
        assert!(owned.get("apiVersion").is_none());
        assert_eq!(owned["metadata"]["name"], "demo-region");
        assert_eq!(owned["data"]["config"], "port: 30888\n");
    }

    #[tokio::test]
    async fn test_converge_create_patch_unchanged() {
        let platform = MemoryPlatform::new();
        let metrics = Metrics::new().unwrap();
        let converger = Converger::new(&platform, &metrics);

        let mut cm = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "demo-region", "namespace": "onecloud"},
            "data": {"config": "port: 30888\n"}
        });

        let outcome = converger.converge(ResourceKind::ConfigMap, "onecloud", &cm).await.unwrap();
        assert_eq!(outcome, ConvergeOutcome::Created);

        let outcome = converger.converge(ResourceKind::ConfigMap, "onecloud", &cm).await.unwrap();
        assert_eq!(outcome, ConvergeOutcome::Unchanged);
        assert_eq!(platform.mutation_count().await, 1);

        cm["data"]["config"] = json!("port: 30889\n");
        let outcome = converger.converge(ResourceKind::ConfigMap, "onecloud", &cm).await.unwrap();
        assert_eq!(outcome, ConvergeOutcome::Patched);
        assert_eq!(platform.mutation_count().await, 2);
    }

    #[tokio::test]
    async fn test_volume_claim_is_create_only() {
        let platform = MemoryPlatform::new();
        let metrics = Metrics::new().unwrap();
        let converger = Converger::new(&platform, &metrics);

        let mut pvc = json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": {"name": "demo-glance", "namespace": "onecloud"},
            "spec": {"resources": {"requests": {"storage": "10G"}}}
        });
        converger
            .converge(ResourceKind::PersistentVolumeClaim, "onecloud", &pvc)
            .await
            .unwrap();

        pvc["spec"]["resources"]["requests"]["storage"] = json!("20G");
        let outcome = converger
            .converge(ResourceKind::PersistentVolumeClaim, "onecloud", &pvc)
            .await
            .unwrap();
        assert_eq!(outcome, ConvergeOutcome::Unchanged);
        assert_eq!(platform.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn test_platform_failure_is_convergence_error() {
        let platform = MemoryPlatform::new();
        platform.fail_writes_for("demo-region").await;
        let metrics = Metrics::new().unwrap();
        let converger = Converger::new(&platform, &metrics);

        let cm = json!({"metadata": {"name": "demo-region"}, "data": {}});
        let err = converger
            .converge(ResourceKind::ConfigMap, "onecloud", &cm)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Convergence { ref name, .. } if name == "demo-region"));
    }

    fn deployment(selector: Value, resources: Option<Value>, tolerations: Option<Value>) -> Value {
        let mut container = json!({"name": "region", "image": "registry/region:v3.10"});
        if let Some(resources) = resources {
            container["resources"] = resources;
        }
        let mut deploy = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "demo-region", "namespace": "onecloud"},
            "spec": {
                "replicas": 1,
                "template": {
                    "metadata": {"labels": {"app": "region"}},
                    "spec": {"nodeSelector": selector, "containers": [container]}
                }
            }
        });
        if let Some(tolerations) = tolerations {
            deploy["spec"]["template"]["spec"]["tolerations"] = tolerations;
        }
        deploy
    }

    #[tokio::test]
    async fn test_dropped_fields_are_removed() {
        let platform = MemoryPlatform::new();
        let metrics = Metrics::new().unwrap();
        let converger = Converger::new(&platform, &metrics);

        let pinned = deployment(
            json!({"rack": "r1"}),
            Some(json!({"limits": {"cpu": "2"}})),
            Some(json!([{"key": "dedicated", "operator": "Exists"}])),
        );
        converger.converge(ResourceKind::Deployment, "onecloud", &pinned).await.unwrap();

        let cleared = deployment(json!({}), None, None);
        let outcome = converger.converge(ResourceKind::Deployment, "onecloud", &cleared).await.unwrap();
        assert_eq!(outcome, ConvergeOutcome::Patched);

        let live = platform.object(ResourceKind::Deployment, "onecloud", "demo-region").await.unwrap();
        let pod = &live["spec"]["template"]["spec"];
        assert!(pod.get("nodeSelector").map_or(true, is_empty), "{}", pod);
        assert!(pod.get("tolerations").is_none());
        assert!(pod["containers"][0].get("resources").is_none());

        let outcome = converger.converge(ResourceKind::Deployment, "onecloud", &cleared).await.unwrap();
        assert_eq!(outcome, ConvergeOutcome::Unchanged);
        assert_eq!(platform.mutation_count().await, 2);
    }

    #[tokio::test]
    async fn test_narrowed_selector_drops_old_keys() {
        let platform = MemoryPlatform::new();
        let metrics = Metrics::new().unwrap();
        let converger = Converger::new(&platform, &metrics);

        let wide = deployment(json!({"rack": "r1", "zone": "z1"}), None, None);
        converger.converge(ResourceKind::Deployment, "onecloud", &wide).await.unwrap();

        let narrow = deployment(json!({"zone": "z1"}), None, None);
        let outcome = converger.converge(ResourceKind::Deployment, "onecloud", &narrow).await.unwrap();
        assert_eq!(outcome, ConvergeOutcome::Patched);
        let live = platform.object(ResourceKind::Deployment, "onecloud", "demo-region").await.unwrap();
        assert_eq!(live["spec"]["template"]["spec"]["nodeSelector"], json!({"zone": "z1"}));
    }

    #[test]
    fn test_removal_patch_nulls_dropped_keys() {
        let live = deployment(json!({"rack": "r1"}), None, Some(json!([{"key": "a"}])));
        let patch = with_removals(owned_fields(&deployment(json!({}), None, None)), &live);
        let pod = &patch["spec"]["template"]["spec"];
        assert_eq!(pod["nodeSelector"], json!({"rack": null}));
        assert_eq!(pod["tolerations"], Value::Null);
        assert!(pod.get("affinity").is_none());
    }

    #[test]
    fn test_quantities_compare_by_amount() {
        assert_eq!(quantity_nanos("0.5"), quantity_nanos("500m"));
        assert_eq!(quantity_nanos("1000m"), quantity_nanos("1"));
        assert_eq!(quantity_nanos("1.5Gi"), quantity_nanos("1536Mi"));
        assert_eq!(quantity_nanos("1e3"), quantity_nanos("1k"));
        assert_eq!(quantity_nanos("2"), Some(2_000_000_000));
        assert_ne!(quantity_nanos("1G"), quantity_nanos("1Gi"));
        assert_eq!(quantity_nanos("fast"), None);
        assert_eq!(quantity_nanos(""), None);

        let want = json!({"limits": {"cpu": "0.5", "memory": "1Gi"}});
        let have = json!({"limits": {"cpu": "500m", "memory": "1024Mi"}});
        assert!(resources_match(Some(&want), Some(&have)));
        assert!(!resources_match(None, Some(&have)));
        assert!(resources_match(None, Some(&json!({}))));
    }

    #[test]
    fn test_canonicalized_resources_stay_in_sync() {
        let desired = owned_fields(&deployment(json!({}), Some(json!({"requests": {"cpu": "0.5"}})), None));
        let live = deployment(json!({}), Some(json!({"requests": {"cpu": "500m"}})), None);
        assert!(in_sync(&desired, &live));

        let live = deployment(json!({}), Some(json!({"requests": {"cpu": "1"}})), None);
        assert!(!in_sync(&desired, &live));
    }

    #[test]
    fn test_workload_status_parsing() {
        let deploy = json!({
            "metadata": {"generation": 3},
            "spec": {"replicas": 2},
            "status": {"observedGeneration": 3, "readyReplicas": 2, "updatedReplicas": 2, "availableReplicas": 2}
        });
        let status = workload_status(ResourceKind::Deployment, &deploy).unwrap();
        assert_eq!(status.generation, 3);
        assert_eq!(status.replicas, 2);
        assert_eq!(status.ready_replicas, 2);

        let ds = json!({
            "metadata": {"generation": 1},
            "status": {"observedGeneration": 1, "desiredNumberScheduled": 3, "numberReady": 1}
        });
        let status = workload_status(ResourceKind::DaemonSet, &ds).unwrap();
        assert_eq!(status.replicas, 3);
        assert_eq!(status.ready_replicas, 1);
        assert_eq!(status.updated_replicas, 0);

        assert!(workload_status(ResourceKind::Service, &ds).is_err());
    }
}
