//! OneCloud Operator - Cluster Component Reconciliation Engine
//!
//! A Kubernetes operator that deploys the services of a OneCloud platform
//! and keeps them converged on the `OnecloudCluster` spec.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                 Controller (kube-runtime) / Standalone loop                 │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                               Orchestrator                                  │
//! │   keystone → region → scheduler → glance → climc → webconsole → logger →   │
//! │   yunionconf → yunionagent → kubeserver → apigateway → web → host          │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │ Options render  │  │ Manifest build  │  │  Converge (get/create/patch) │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────────┘  │
//! │  ┌─────────────────────────────────────────────────────────────────────┐    │
//! │  │  Phase derivation → phase control (service catalog registration)    │    │
//! │  └─────────────────────────────────────────────────────────────────────┘    │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  PlatformClient: Kubernetes | Memory     ServiceCatalog: Keystone | Memory │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: orchestrator, component drivers, adapters and APIs
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: ports to the orchestration platform and service catalog
//! - [`error`]: Error types and handling

pub mod controlplane;
pub mod crd;
pub mod domain;
pub mod error;

// Re-export commonly used types
pub use controlplane::{
    ApiServer, ApiServerConfig, KeystoneCatalogProvider, KubePlatform, MemoryCatalog,
    MemoryPlatform, Metrics, OperatorConfig, Orchestrator, ReconcileReport,
    StaticCatalogProvider,
};

pub use crd::{OnecloudCluster, OnecloudClusterSpec, OnecloudClusterStatus, Phase};

pub use domain::ports::{ComponentType, PlatformClient, ResourceKind, ServiceCatalog};

pub use error::{Error, ErrorAction, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
