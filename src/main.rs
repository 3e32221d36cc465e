//! OneCloud Operator
//!
//! Deploys the services of a OneCloud platform onto Kubernetes and keeps
//! them converged on each `OnecloudCluster` spec.
//!
//! Two run modes:
//! - Kubernetes (default): watches `OnecloudCluster` resources through the
//!   API server and registers endpoints in each cluster's keystone
//! - Standalone: reconciles a single cluster read from a YAML file against
//!   in-memory platform and catalog adapters

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use onecloud_operator::controlplane::controller;
use onecloud_operator::{
    ApiServer, ApiServerConfig, Error, KeystoneCatalogProvider, KubePlatform, MemoryCatalog,
    MemoryPlatform, Metrics, OnecloudCluster, OperatorConfig, Orchestrator, Result,
    StaticCatalogProvider,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// OneCloud Operator - converges OneCloud platform services on Kubernetes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Status API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Seconds between reconcile passes of a healthy cluster
    #[arg(long, env = "REQUEUE_INTERVAL", default_value = "300")]
    requeue_interval_secs: u64,

    /// Seconds before retrying a failed pass
    #[arg(long, env = "ERROR_REQUEUE_INTERVAL", default_value = "15")]
    error_requeue_secs: u64,

    /// Identity v3 URL used instead of the in-cluster keystone service
    #[arg(long, env = "KEYSTONE_URL")]
    keystone_url: Option<String>,

    /// Skip certificate verification when talking to keystone
    #[arg(long, env = "INSECURE_CATALOG")]
    insecure_catalog: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run in standalone mode (no Kubernetes)
    #[arg(long, env = "STANDALONE", requires = "cluster_file")]
    standalone: bool,

    /// OnecloudCluster manifest reconciled in standalone mode
    #[arg(long, env = "CLUSTER_FILE")]
    cluster_file: Option<PathBuf>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting OneCloud Operator");
    info!("  Version: {}", onecloud_operator::VERSION);
    info!("  Status API: {}", args.api_addr);
    info!("  Namespace: {}", args.namespace.as_deref().unwrap_or("<all>"));
    info!("  Standalone mode: {}", args.standalone);

    let config = OperatorConfig {
        namespace: args.namespace.clone(),
        requeue_interval_secs: args.requeue_interval_secs,
        error_requeue_secs: args.error_requeue_secs,
    };
    let metrics = Metrics::new()?;

    let health_addr = parse_addr("health-addr", &args.health_addr)?;
    tokio::spawn(async move {
        if let Err(e) = run_health_server(health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    let api_config = ApiServerConfig {
        rest_addr: parse_addr("api-addr", &args.api_addr)?,
    };
    let metrics_addr = parse_addr("metrics-addr", &args.metrics_addr)?;

    if args.standalone {
        let path = args
            .cluster_file
            .clone()
            .ok_or_else(|| Error::configuration("cluster-file", "required in standalone mode"))?;
        let cluster = load_cluster(&path)?;

        let orchestrator = Orchestrator::new(
            config,
            Arc::new(MemoryPlatform::new()),
            Arc::new(StaticCatalogProvider::new(Arc::new(MemoryCatalog::new()))),
            metrics,
        );
        spawn_servers(&orchestrator, api_config, metrics_addr);
        run_standalone(orchestrator, cluster).await;
    } else {
        let client = kube::Client::try_default().await?;
        let catalogs = KeystoneCatalogProvider {
            auth_url_override: args.keystone_url.clone(),
            insecure: args.insecure_catalog,
        };
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(KubePlatform::new(client.clone())),
            Arc::new(catalogs),
            metrics,
        );
        spawn_servers(&orchestrator, api_config, metrics_addr);
        controller::run(client, orchestrator).await;
    }

    info!("Operator shutdown complete");
    Ok(())
}

fn parse_addr(field: &str, addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| Error::configuration(field, format!("invalid address {}: {}", addr, e)))
}

fn spawn_servers(orchestrator: &Arc<Orchestrator>, api_config: ApiServerConfig, metrics_addr: SocketAddr) {
    let api_server = ApiServer::new(api_config, orchestrator.clone());
    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            error!("Status API error: {}", e);
        }
    });

    let orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(metrics_addr, orchestrator).await {
            error!("Metrics server error: {}", e);
        }
    });
}

// =============================================================================
// Standalone Mode
// =============================================================================

fn load_cluster(path: &PathBuf) -> Result<OnecloudCluster> {
    let raw = std::fs::read_to_string(path)?;
    let cluster: OnecloudCluster = serde_yaml::from_str(&raw)?;
    info!(cluster = %cluster.cluster_name(), file = %path.display(), "Loaded cluster manifest");
    Ok(cluster)
}

async fn run_standalone(orchestrator: Arc<Orchestrator>, mut cluster: OnecloudCluster) {
    let config = orchestrator.config().clone();
    loop {
        let delay = match orchestrator.reconcile(&mut cluster).await {
            Ok(()) => Duration::from_secs(config.requeue_interval_secs),
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Reconcile failed, will retry");
                Duration::from_secs(config.error_requeue_secs)
            }
            Err(e) => {
                error!(error = %e, "Reconcile failed, fix the cluster file and restart");
                Duration::from_secs(config.requeue_interval_secs)
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "axum=info"] {
        let directive = directive
            .parse()
            .map_err(|e| Error::configuration("log-level", format!("{}", e)))?;
        filter = filter.add_directive(directive);
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Health Server
// =============================================================================

fn respond(status: hyper::StatusCode, body: impl Into<hyper::Body>) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(body.into());
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: SocketAddr) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => respond(StatusCode::OK, "ok"),
                _ => respond(StatusCode::NOT_FOUND, "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: SocketAddr, orchestrator: Arc<Orchestrator>) -> Result<()> {
    use hyper::header::CONTENT_TYPE;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let orchestrator = orchestrator.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let orchestrator = orchestrator.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match orchestrator.metrics().gather() {
                            Ok((content_type, buffer)) => {
                                let mut response = respond(StatusCode::OK, buffer);
                                if let Ok(value) = content_type.parse() {
                                    response.headers_mut().insert(CONTENT_TYPE, value);
                                }
                                response
                            }
                            Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                        },
                        _ => respond(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
