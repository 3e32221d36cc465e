//! Kubernetes Controller
//!
//! Watches `OnecloudCluster` resources and the workloads they own, runs the
//! orchestrator for every change and writes the resulting status back.

use crate::controlplane::orchestrator::{OperatorConfig, Orchestrator};
use crate::crd::{OnecloudCluster, OnecloudClusterStatus};
use crate::error::{Error, ErrorAction, Result};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const FIELD_MANAGER: &str = "onecloud-operator";

/// Shared state handed to every reconcile call
pub struct ControllerContext {
    pub client: Client,
    pub orchestrator: Arc<Orchestrator>,
}

impl ControllerContext {
    pub fn new(client: Client, orchestrator: Arc<Orchestrator>) -> Arc<Self> {
        Arc::new(Self {
            client,
            orchestrator,
        })
    }
}

fn watched<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Whether a pass changed the status beyond its reconcile timestamp.
///
/// Every status write is a watch event on the cluster, so writing the
/// timestamp alone would start the next pass immediately.
pub fn status_changed(
    before: Option<&OnecloudClusterStatus>,
    after: Option<&OnecloudClusterStatus>,
) -> bool {
    let strip = |status: Option<&OnecloudClusterStatus>| {
        status.cloned().map(|mut s| {
            s.last_reconcile_time = None;
            s
        })
    };
    strip(before) != strip(after)
}

/// Reconcile one cluster and persist its status.
///
/// Status is written even when some components failed so the observed phase
/// always reflects the last pass. A pass that changed nothing but the
/// timestamp writes nothing.
pub async fn reconcile(cluster: Arc<OnecloudCluster>, ctx: Arc<ControllerContext>) -> Result<Action> {
    let mut cluster = (*cluster).clone();
    let namespace = cluster.cluster_namespace();
    let name = cluster.cluster_name();
    let before = cluster.status.clone();

    let outcome = ctx.orchestrator.reconcile(&mut cluster).await;
    let interval = Duration::from_secs(ctx.orchestrator.config().requeue_interval_secs);

    if !status_changed(before.as_ref(), cluster.status.as_ref()) {
        debug!(cluster = %name, namespace = %namespace, "Status unchanged");
        outcome?;
        return Ok(Action::requeue(interval));
    }

    let api: Api<OnecloudCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = json!({ "status": cluster.status });
    match api
        .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => {}
        Err(kube::Error::Api(resp)) if resp.code == 404 => {
            info!(cluster = %name, namespace = %namespace, "Cluster deleted");
            ctx.orchestrator.forget(&namespace, &name).await;
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    }
    debug!(cluster = %name, namespace = %namespace, "Patched cluster status");

    outcome?;
    Ok(Action::requeue(interval))
}

/// Map a failed pass onto a requeue decision
pub fn requeue_action(config: &OperatorConfig, err: &Error) -> Action {
    match err.action() {
        ErrorAction::NoRequeue => Action::await_change(),
        ErrorAction::RequeueAfter(delay) => Action::requeue(delay),
        ErrorAction::RequeueWithBackoff => {
            Action::requeue(Duration::from_secs(config.error_requeue_secs))
        }
    }
}

pub fn error_policy(cluster: Arc<OnecloudCluster>, err: &Error, ctx: Arc<ControllerContext>) -> Action {
    let action = requeue_action(ctx.orchestrator.config(), err);
    if err.is_retryable() {
        warn!(cluster = %cluster.name_any(), error = %err, "Reconcile failed, will retry");
    } else {
        error!(cluster = %cluster.name_any(), error = %err, "Reconcile failed, waiting for spec change");
    }
    action
}

/// Run the controller until a shutdown signal arrives
pub async fn run(client: Client, orchestrator: Arc<Orchestrator>) {
    let namespace = orchestrator.config().namespace.clone();
    let ns = namespace.as_deref();
    let clusters: Api<OnecloudCluster> = watched(&client, ns);

    info!(namespace = ns.unwrap_or("<all>"), "Starting OnecloudCluster controller");

    let config = watcher::Config::default();
    Controller::new(clusters, config.clone())
        .owns(watched::<Deployment>(&client, ns), config.clone())
        .owns(watched::<DaemonSet>(&client, ns), config.clone())
        .owns(watched::<ConfigMap>(&client, ns), config.clone())
        .owns(watched::<Service>(&client, ns), config.clone())
        .owns(watched::<PersistentVolumeClaim>(&client, ns), config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ControllerContext::new(client, orchestrator))
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(cluster = %object.name, ?action, "Reconciliation completed");
                }
                Err(e) => {
                    warn!(error = %e, "Reconciliation error");
                }
            }
        })
        .await;

    info!("OnecloudCluster controller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::Phase;
    use crate::domain::ports::ComponentType;
    use crate::error::{ComponentError, ReconcileErrors};
    use chrono::{Duration as ChronoDuration, Utc};

    #[test]
    fn test_timestamp_only_pass_skips_status_write() {
        let mut before = OnecloudClusterStatus {
            phase: Some(Phase::Normal),
            last_reconcile_time: Some(Utc::now() - ChronoDuration::minutes(5)),
            ..Default::default()
        };
        before.keystone.phase = Some(Phase::Normal);

        let mut after = before.clone();
        after.last_reconcile_time = Some(Utc::now());
        assert!(!status_changed(Some(&before), Some(&after)));

        after.keystone.phase = Some(Phase::Upgrade);
        assert!(status_changed(Some(&before), Some(&after)));

        assert!(status_changed(None, Some(&before)));
        assert!(!status_changed(None, None));
    }

    #[test]
    fn test_configuration_errors_wait_for_change() {
        let config = OperatorConfig::default();
        let err = Error::configuration("keystone.bootstrapPassword", "must be set");
        assert_eq!(requeue_action(&config, &err), Action::await_change());
    }

    #[test]
    fn test_transient_errors_requeue() {
        let config = OperatorConfig {
            error_requeue_secs: 7,
            ..Default::default()
        };
        let err = Error::Convergence {
            kind: "Deployment".into(),
            name: "demo-region".into(),
            reason: "conflict".into(),
        };
        assert_eq!(requeue_action(&config, &err), Action::requeue(Duration::from_secs(7)));

        let missing = Error::ResourceNotFound {
            kind: "Deployment".into(),
            name: "demo-region".into(),
        };
        assert_eq!(requeue_action(&config, &missing), Action::requeue(Duration::from_secs(30)));
    }

    #[test]
    fn test_mixed_component_failures_requeue() {
        let config = OperatorConfig::default();
        let mut errors = ReconcileErrors::new();
        errors.push(ComponentError::new(
            ComponentType::Keystone,
            Error::configuration("keystone.bootstrapPassword", "must be set"),
        ));
        errors.push(ComponentError::new(
            ComponentType::Region,
            Error::Internal("apiserver unavailable".into()),
        ));
        assert_eq!(
            requeue_action(&config, &Error::Reconcile(errors)),
            Action::requeue(Duration::from_secs(config.error_requeue_secs))
        );
    }
}
