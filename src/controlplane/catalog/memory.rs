//! In-memory service catalog

use crate::domain::ports::{
    EndpointInterface, ServiceCatalog, ServiceCatalogEntry, UpsertOutcome,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Catalog keeping services and endpoints in process memory
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    /// service name -> service type
    services: DashMap<String, String>,
    endpoints: DashMap<(String, EndpointInterface), ServiceCatalogEntry>,
    writes: AtomicU64,
    failing: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered endpoint of a service
    pub fn endpoint(&self, service: &str, interface: EndpointInterface) -> Option<ServiceCatalogEntry> {
        self.endpoints
            .get(&(service.to_string(), interface))
            .map(|e| e.value().clone())
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Every registered endpoint, sorted by service and interface
    pub fn entries(&self) -> Vec<ServiceCatalogEntry> {
        let mut out: Vec<_> = self.endpoints.iter().map(|e| e.value().clone()).collect();
        out.sort_by(|a, b| {
            (a.service_name.as_str(), a.interface).cmp(&(b.service_name.as_str(), b.interface))
        });
        out
    }

    /// Creates and updates applied so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Make every upsert fail until cleared
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check(&self, service: &str) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::Registration {
                service: service.to_string(),
                reason: "catalog unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for MemoryCatalog {
    async fn ensure_service(&self, service_name: &str, service_type: &str) -> Result<UpsertOutcome> {
        self.check(service_name)?;
        match self.services.get(service_name) {
            Some(t) if t.value() == service_type => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                self.services
                    .insert(service_name.to_string(), service_type.to_string());
                self.writes.fetch_add(1, Ordering::Relaxed);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.services
                    .insert(service_name.to_string(), service_type.to_string());
                self.writes.fetch_add(1, Ordering::Relaxed);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn upsert_endpoint(&self, entry: &ServiceCatalogEntry) -> Result<UpsertOutcome> {
        self.ensure_service(&entry.service_name, &entry.service_type).await?;

        let key = (entry.service_name.clone(), entry.interface);
        let outcome = match self.endpoints.get(&key) {
            Some(existing) if existing.value() == entry => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        self.endpoints.insert(key, entry.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(outcome)
    }

    fn catalog_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> ServiceCatalogEntry {
        ServiceCatalogEntry {
            service_name: "region2".into(),
            service_type: "compute_v2".into(),
            interface: EndpointInterface::Internal,
            region: "region0".into(),
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn test_upsert_outcomes() {
        let catalog = MemoryCatalog::new();
        let first = entry("https://demo-region.onecloud.svc:30888");
        assert_eq!(catalog.upsert_endpoint(&first).await.unwrap(), UpsertOutcome::Created);
        assert_eq!(catalog.upsert_endpoint(&first).await.unwrap(), UpsertOutcome::Unchanged);

        let moved = entry("https://demo-region.onecloud.svc:30889");
        assert_eq!(catalog.upsert_endpoint(&moved).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(
            catalog.endpoint("region2", EndpointInterface::Internal).unwrap().url,
            moved.url
        );
        assert!(catalog.has_service("region2"));
        assert_eq!(catalog.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let catalog = MemoryCatalog::new();
        catalog.set_failing(true);
        let err = catalog.upsert_endpoint(&entry("http://x")).await.unwrap_err();
        assert!(matches!(err, Error::Registration { .. }));
        assert_eq!(catalog.write_count(), 0);
    }
}
