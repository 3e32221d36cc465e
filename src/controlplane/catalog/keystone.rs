//! Keystone Service Catalog Adapter
//!
//! Registers services and endpoints through the identity v3 API. Tokens are
//! obtained with the cluster's bootstrap admin credential and cached for the
//! lifetime of the adapter.

use super::CatalogProvider;
use crate::controlplane::constants::{DEFAULT_DOMAIN, SYSADMIN_PROJECT, SYSADMIN_USER};
use crate::controlplane::options::keystone_auth_url;
use crate::crd::OnecloudCluster;
use crate::domain::ports::{
    ServiceCatalog, ServiceCatalogEntry, ServiceCatalogRef, UpsertOutcome,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for a keystone catalog
#[derive(Debug, Clone)]
pub struct KeystoneConfig {
    /// Identity v3 base URL, e.g. `https://keystone:30357/v3`
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project: String,
    pub domain: String,
    /// Region endpoints are registered in
    pub region: String,
    /// Skip certificate verification (self-signed cluster CA)
    pub insecure: bool,
    pub timeout: Duration,
}

impl KeystoneConfig {
    /// Admin credential of a cluster
    pub fn for_cluster(cluster: &OnecloudCluster) -> Self {
        Self {
            auth_url: keystone_auth_url(cluster),
            username: SYSADMIN_USER.to_string(),
            password: cluster.spec.keystone.bootstrap_password.clone(),
            project: SYSADMIN_PROJECT.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            region: cluster.spec.region.clone(),
            insecure: false,
            timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ServiceRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    service_type: String,
}

#[derive(Debug, Deserialize)]
struct ServiceList {
    services: Vec<ServiceRecord>,
}

#[derive(Debug, Deserialize)]
struct ServiceBody {
    service: ServiceRecord,
}

#[derive(Debug, Deserialize)]
struct EndpointRecord {
    id: String,
    url: String,
    interface: String,
    #[serde(default)]
    region_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EndpointList {
    endpoints: Vec<EndpointRecord>,
}

// =============================================================================
// Keystone Catalog
// =============================================================================

/// Service catalog backed by a keystone identity server
pub struct KeystoneCatalog {
    config: KeystoneConfig,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl KeystoneCatalog {
    pub fn new(config: KeystoneConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.auth_url.trim_end_matches('/'), path)
    }

    async fn token(&self) -> Result<String> {
        let cached = self.token.lock().clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.config.username,
                            "domain": {"name": self.config.domain},
                            "password": self.config.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.config.project,
                        "domain": {"name": self.config.domain},
                    }
                }
            }
        });

        let response = self.http.post(self.url("auth/tokens")).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(self.registration_error("auth", response).await);
        }
        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Registration {
                service: "keystone".to_string(),
                reason: format!("authentication response without {}", SUBJECT_TOKEN_HEADER),
            })?
            .to_string();

        debug!(auth_url = %self.config.auth_url, "Obtained keystone token");
        *self.token.lock() = Some(token.clone());
        Ok(token)
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.token().await?;
        Ok(self
            .http
            .request(method, self.url(path))
            .header(AUTH_TOKEN_HEADER, token))
    }

    async fn registration_error(&self, service: &str, response: reqwest::Response) -> Error {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.token.lock().take();
        }
        let body = response.text().await.unwrap_or_default();
        Error::Registration {
            service: service.to_string(),
            reason: format!("{}: {}", status, body),
        }
    }

    async fn find_service(&self, name: &str, service_type: &str) -> Result<Option<ServiceRecord>> {
        let response = self
            .request(Method::GET, "services")
            .await?
            .query(&[("type", service_type)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(self.registration_error(name, response).await);
        }
        let list: ServiceList = response.json().await?;
        Ok(list
            .services
            .into_iter()
            .find(|s| s.name == name && s.service_type == service_type))
    }

    async fn service_id(&self, name: &str, service_type: &str) -> Result<(String, UpsertOutcome)> {
        if let Some(service) = self.find_service(name, service_type).await? {
            return Ok((service.id, UpsertOutcome::Unchanged));
        }

        let response = self
            .request(Method::POST, "services")
            .await?
            .json(&json!({"service": {"name": name, "type": service_type, "enabled": true}}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(self.registration_error(name, response).await);
        }
        let created: ServiceBody = response.json().await?;
        info!(service = %created.service.name, "Registered service");
        Ok((created.service.id, UpsertOutcome::Created))
    }
}

#[async_trait]
impl ServiceCatalog for KeystoneCatalog {
    async fn ensure_service(&self, service_name: &str, service_type: &str) -> Result<UpsertOutcome> {
        Ok(self.service_id(service_name, service_type).await?.1)
    }

    async fn upsert_endpoint(&self, entry: &ServiceCatalogEntry) -> Result<UpsertOutcome> {
        let (service_id, _) = self.service_id(&entry.service_name, &entry.service_type).await?;
        let interface = entry.interface.to_string();

        let response = self
            .request(Method::GET, "endpoints")
            .await?
            .query(&[("service_id", service_id.as_str()), ("interface", interface.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(self.registration_error(&entry.service_name, response).await);
        }
        let existing: EndpointList = response.json().await?;
        let existing = existing.endpoints.into_iter().find(|e| {
            e.interface == interface && e.region_id.as_deref().map_or(true, |r| r == entry.region)
        });

        let (method, path, outcome) = match &existing {
            Some(ep) if ep.url == entry.url => return Ok(UpsertOutcome::Unchanged),
            Some(ep) => (Method::PATCH, format!("endpoints/{}", ep.id), UpsertOutcome::Updated),
            None => (Method::POST, "endpoints".to_string(), UpsertOutcome::Created),
        };

        let body: Value = json!({
            "endpoint": {
                "service_id": service_id,
                "interface": interface,
                "url": entry.url,
                "region_id": entry.region,
                "enabled": true,
            }
        });
        let response = self.request(method, &path).await?.json(&body).send().await?;
        if !response.status().is_success() {
            return Err(self.registration_error(&entry.service_name, response).await);
        }

        info!(
            service = %entry.service_name,
            interface = %interface,
            url = %entry.url,
            outcome = ?outcome,
            "Upserted endpoint"
        );
        Ok(outcome)
    }

    fn catalog_name(&self) -> &str {
        "keystone"
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Connects to the keystone of whichever cluster is being reconciled
#[derive(Debug, Clone, Default)]
pub struct KeystoneCatalogProvider {
    /// Replaces the in-cluster identity URL, e.g. when running outside the cluster
    pub auth_url_override: Option<String>,
    pub insecure: bool,
}

#[async_trait]
impl CatalogProvider for KeystoneCatalogProvider {
    async fn catalog_for(&self, cluster: &OnecloudCluster) -> Result<ServiceCatalogRef> {
        let mut config = KeystoneConfig::for_cluster(cluster);
        if let Some(url) = &self.auth_url_override {
            config.auth_url = url.clone();
        }
        config.insecure = self.insecure;
        Ok(Arc::new(KeystoneCatalog::new(config)?))
    }
}
