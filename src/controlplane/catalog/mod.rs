//! Service Catalog Adapters
//!
//! - Keystone: the identity server of the reconciled cluster
//! - Memory: process-local catalog for standalone runs and tests

pub mod keystone;
pub mod memory;

pub use keystone::*;
pub use memory::*;

use crate::crd::OnecloudCluster;
use crate::domain::ports::ServiceCatalogRef;
use crate::error::Result;
use async_trait::async_trait;

/// Resolves the catalog a cluster's services register in.
///
/// The catalog lives inside the cluster being reconciled, so it can only be
/// reached once that cluster's identity settings are known.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn catalog_for(&self, cluster: &OnecloudCluster) -> Result<ServiceCatalogRef>;
}

/// Hands out the same catalog for every cluster
#[derive(Clone)]
pub struct StaticCatalogProvider {
    catalog: ServiceCatalogRef,
}

impl StaticCatalogProvider {
    pub fn new(catalog: ServiceCatalogRef) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalogProvider {
    async fn catalog_for(&self, _cluster: &OnecloudCluster) -> Result<ServiceCatalogRef> {
        Ok(self.catalog.clone())
    }
}
