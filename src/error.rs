//! Error types for the OneCloud operator
//!
//! Every failure during a reconcile pass is attributed to exactly one
//! component. The orchestrator collects them into [`ReconcileErrors`] so the
//! controller can report which components failed without masking the others.

use crate::domain::ports::ComponentType;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    /// A required cluster spec field is missing or malformed
    #[error("Configuration error at {field}: {reason}")]
    Configuration { field: String, reason: String },

    // =========================================================================
    // Platform Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// A create/get/patch against the orchestration platform failed
    #[error("Convergence of {kind}/{name} failed: {reason}")]
    Convergence {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    // =========================================================================
    // Service Catalog Errors
    // =========================================================================
    /// Catalog upsert failed
    #[error("Registration of service {service} failed: {reason}")]
    Registration { service: String, reason: String },

    #[error("Service catalog connection error: {0}")]
    CatalogConnection(#[from] reqwest::Error),

    // =========================================================================
    // Reconcile Errors
    // =========================================================================
    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileErrors),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML render error: {0}")]
    YamlRender(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Build a configuration error for a spec field path
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // The spec has to change before a retry can succeed
            Error::Configuration { .. } => ErrorAction::NoRequeue,

            Error::Component(err) => err.source.action(),

            // Only stop retrying if every failed component is misconfigured
            Error::Reconcile(errors) => {
                if errors.iter().all(|e| !e.source.is_retryable()) {
                    ErrorAction::NoRequeue
                } else {
                    ErrorAction::RequeueWithBackoff
                }
            }

            // Not-yet-created dependencies usually show up within a minute
            Error::ResourceNotFound { .. } => ErrorAction::RequeueAfter(Duration::from_secs(30)),

            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(_)
            | Error::Convergence { .. }
            | Error::Registration { .. }
            | Error::CatalogConnection(_) => true,
            Error::Component(err) => err.source.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Component Attribution
// =============================================================================

/// An error raised while syncing a single component
#[derive(Error, Debug)]
#[error("component {component}: {source}")]
pub struct ComponentError {
    pub component: ComponentType,
    #[source]
    pub source: Box<Error>,
}

impl ComponentError {
    pub fn new(component: ComponentType, source: Error) -> Self {
        // Avoid double tagging when a driver already attributed the error
        match source {
            Error::Component(inner) => inner,
            other => Self {
                component,
                source: Box::new(other),
            },
        }
    }
}

/// All component failures from one reconcile pass
#[derive(Debug, Default)]
pub struct ReconcileErrors {
    errors: Vec<ComponentError>,
}

impl ReconcileErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ComponentError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentError> {
        self.errors.iter()
    }

    /// Components that failed, in reconcile order
    pub fn components(&self) -> Vec<ComponentType> {
        self.errors.iter().map(|e| e.component).collect()
    }

    /// `Ok` when nothing failed
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Reconcile(self))
        }
    }
}

impl fmt::Display for ReconcileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} component(s) failed to reconcile", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReconcileErrors {}
