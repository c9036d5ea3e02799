//! Substrate Contract
//!
//! The reconciler talks to the surrounding orchestration system exclusively
//! through this trait, enabling pluggable backends (MemoryStore for tests and
//! embedding, an API-server client in a real deployment).

use async_trait::async_trait;
use thiserror::Error;

use crate::resources::{CustomResource, NamespacedName, Workflow};

/// Errors surfaced by a `ResourceStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Write target does not exist.
    #[error("{kind} {key} not found")]
    NotFound {
        kind: &'static str,
        key: NamespacedName,
    },

    /// Create target already exists under the same name.
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        kind: &'static str,
        key: NamespacedName,
    },

    /// Conditional write lost against a newer resource version.
    #[error("conflict writing {kind} {key}: stale resource version")]
    Conflict {
        kind: &'static str,
        key: NamespacedName,
    },

    /// Any other backend failure. Callers treat these as transient and leave
    /// retry policy to the substrate's backoff.
    #[error("store backend: {0}")]
    Backend(String),
}

/// Object-store operations the reconciler needs.
///
/// Reads return `Ok(None)` for absent objects — absence is a normal
/// state-machine branch, not an error. Distinct identities may be reconciled
/// concurrently, so implementations take `&self` and must be `Send + Sync`.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    // ── Custom resources ──

    async fn get_custom_resource(
        &self,
        key: &NamespacedName,
    ) -> Result<Option<CustomResource>, StoreError>;

    /// Conditional write of `status`, keyed on the CR's `resource_version`.
    ///
    /// A stale version must surface `StoreError::Conflict` so the caller can
    /// start a fresh cycle from a fresh read — never a silent overwrite.
    async fn update_status(&self, cr: &CustomResource) -> Result<(), StoreError>;

    // ── Workflows ──

    async fn get_workflow(&self, key: &NamespacedName) -> Result<Option<Workflow>, StoreError>;

    /// Create-if-absent. An existing object under the same name surfaces
    /// `StoreError::AlreadyExists`.
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;
}
