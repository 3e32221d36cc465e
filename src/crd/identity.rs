//! Identity provider input shape
//!
//! Kept for input compatibility with clients that still send the
//! deprecated `target_domain_id` field. The operator registers no identity
//! providers itself: the type is exported from `crd` for library users that
//! decode create requests before forwarding them to keystone.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request body for creating an identity provider in keystone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityProviderCreateInput {
    pub name: String,

    #[serde(default)]
    pub driver: String,

    #[serde(default)]
    pub template: String,

    /// Domain users and groups are imported into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,

    /// Superseded by `target_domain`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_domain_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_create_project: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_seconds: Option<i32>,

    #[serde(default)]
    pub config: BTreeMap<String, BTreeMap<String, Value>>,
}

impl IdentityProviderCreateInput {
    /// Target domain, falling back to the deprecated id field
    pub fn effective_target_domain(&self) -> Option<&str> {
        self.target_domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .or_else(|| self.target_domain_id.as_deref().filter(|d| !d.is_empty()))
    }
}
