//! OneCloud Control Plane Module
//!
//! Renders, converges and registers every OneCloud component of a
//! cluster, and exposes the result through the controller and status API.

pub mod api;
pub mod builder;
pub mod catalog;
pub mod components;
pub mod constants;
pub mod controller;
pub mod converge;
pub mod metrics;
pub mod options;
pub mod orchestrator;
pub mod phase;
pub mod platform;

pub use api::*;
pub use catalog::{
    CatalogProvider, KeystoneCatalog, KeystoneCatalogProvider, KeystoneConfig, MemoryCatalog,
    StaticCatalogProvider,
};
pub use components::{default_drivers, ComponentDriver, SyncContext, SyncOutcome};
pub use converge::{ConvergeOutcome, Converger};
pub use metrics::Metrics;
pub use orchestrator::*;
pub use phase::{derive_phase, PhaseControl};
pub use platform::*;
