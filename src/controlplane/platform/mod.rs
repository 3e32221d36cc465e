//! Platform Adapters
//!
//! - Kubernetes: the API server the operator runs against
//! - Memory: process-local objects for standalone runs and tests

pub mod kubernetes;
pub mod memory;

pub use kubernetes::*;
pub use memory::*;
