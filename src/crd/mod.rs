//! Custom Resource Definitions for the OneCloud operator
//!
//! - OnecloudCluster: desired and observed state of a platform cluster
//! - IdentityProviderCreateInput: identity input kept for compatibility

pub mod identity;
pub mod onecloud_cluster;

pub use identity::*;
pub use onecloud_cluster::*;
