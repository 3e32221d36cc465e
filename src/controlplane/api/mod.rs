//! Status API
//!
//! Read-only HTTP view over the orchestrator: the last reconcile report of
//! every cluster plus liveness and readiness probes.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
