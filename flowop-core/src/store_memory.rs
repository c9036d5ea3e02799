//! In-Memory Store
//!
//! `ResourceStore` backend holding everything in process memory. Used by the
//! test suite and by embedders that want the reconciler without a cluster.
//! Write semantics (resource-version bumps, conditional status updates,
//! create-if-absent) match what a real API server enforces.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::resources::{CustomResource, NamespacedName, Workflow, WorkflowPhase};
use crate::store::{ResourceStore, StoreError};

const CR_KIND_LABEL: &str = "custom resource";
const WORKFLOW_KIND_LABEL: &str = "workflow";

#[derive(Default)]
struct Inner {
    custom_resources: HashMap<NamespacedName, CustomResource>,
    workflows: HashMap<NamespacedName, Workflow>,
}

/// In-memory `ResourceStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a custom resource, stamping store-owned metadata
    /// (uid, creation timestamp, bumped resource version). Returns the stored
    /// copy. This models a user or automation writing the object.
    pub async fn put_custom_resource(&self, mut cr: CustomResource) -> CustomResource {
        let mut inner = self.inner.write().await;
        let key = cr.key();
        let previous_version = inner
            .custom_resources
            .get(&key)
            .and_then(|existing| existing.metadata.resource_version);

        if cr.metadata.uid.is_none() {
            cr.metadata.uid = Some(Uuid::new_v4());
        }
        if cr.metadata.creation_timestamp.is_none() {
            cr.metadata.creation_timestamp = Some(Utc::now());
        }
        cr.metadata.resource_version = Some(previous_version.unwrap_or(0) + 1);

        inner.custom_resources.insert(key, cr.clone());
        cr
    }

    pub async fn delete_custom_resource(&self, key: &NamespacedName) -> bool {
        self.inner
            .write()
            .await
            .custom_resources
            .remove(key)
            .is_some()
    }

    /// Set a workflow's observed phase, as the external engine would.
    /// Returns false when the workflow does not exist.
    pub async fn set_workflow_phase(&self, key: &NamespacedName, phase: WorkflowPhase) -> bool {
        let mut inner = self.inner.write().await;
        match inner.workflows.get_mut(key) {
            Some(workflow) => {
                workflow.status.phase = Some(phase);
                if let Some(version) = workflow.metadata.resource_version.as_mut() {
                    *version += 1;
                }
                true
            }
            None => false,
        }
    }

    pub async fn delete_workflow(&self, key: &NamespacedName) -> bool {
        self.inner.write().await.workflows.remove(key).is_some()
    }

    /// Snapshot of all stored workflows, for assertions.
    pub async fn workflows(&self) -> Vec<Workflow> {
        self.inner.read().await.workflows.values().cloned().collect()
    }

    pub async fn workflow_count(&self) -> usize {
        self.inner.read().await.workflows.len()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_custom_resource(
        &self,
        key: &NamespacedName,
    ) -> Result<Option<CustomResource>, StoreError> {
        Ok(self.inner.read().await.custom_resources.get(key).cloned())
    }

    async fn update_status(&self, cr: &CustomResource) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = cr.key();
        let stored = inner
            .custom_resources
            .get_mut(&key)
            .ok_or(StoreError::NotFound {
                kind: CR_KIND_LABEL,
                key: key.clone(),
            })?;

        if stored.metadata.resource_version != cr.metadata.resource_version {
            return Err(StoreError::Conflict {
                kind: CR_KIND_LABEL,
                key,
            });
        }

        // Status subresource: only the status block is written.
        stored.status = cr.status.clone();
        stored.metadata.resource_version =
            Some(stored.metadata.resource_version.unwrap_or(0) + 1);
        Ok(())
    }

    async fn get_workflow(&self, key: &NamespacedName) -> Result<Option<Workflow>, StoreError> {
        Ok(self.inner.read().await.workflows.get(key).cloned())
    }

    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = workflow.key();
        if inner.workflows.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: WORKFLOW_KIND_LABEL,
                key,
            });
        }

        let mut stored = workflow.clone();
        stored.metadata.uid = Some(Uuid::new_v4());
        stored.metadata.creation_timestamp = Some(Utc::now());
        stored.metadata.resource_version = Some(1);
        inner.workflows.insert(key, stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ObjectMeta, WorkflowSpec, WorkflowStatus};

    fn workflow(namespace: &str, name: &str) -> Workflow {
        Workflow {
            api_version: None,
            kind: None,
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..ObjectMeta::default()
            },
            spec: WorkflowSpec::default(),
            status: WorkflowStatus::default(),
        }
    }

    #[tokio::test]
    async fn test_put_stamps_metadata_and_bumps_version() {
        let store = MemoryStore::new();
        let cr = store
            .put_custom_resource(CustomResource::new("batch", "job"))
            .await;
        assert!(cr.metadata.uid.is_some());
        assert!(cr.metadata.creation_timestamp.is_some());
        assert_eq!(cr.metadata.resource_version, Some(1));

        let cr = store.put_custom_resource(cr).await;
        assert_eq!(cr.metadata.resource_version, Some(2));
    }

    #[tokio::test]
    async fn test_update_status_rejects_stale_version() {
        let store = MemoryStore::new();
        let fresh = store
            .put_custom_resource(CustomResource::new("batch", "job"))
            .await;

        // A concurrent writer bumps the stored version.
        store.put_custom_resource(fresh.clone()).await;

        let mut stale = fresh;
        stale.status.workflow_hash = Some("abc".into());
        let err = store.update_status(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_status_writes_only_status() {
        let store = MemoryStore::new();
        let mut cr = store
            .put_custom_resource(CustomResource::new("batch", "job").with_field("Message", "hi"))
            .await;

        cr.status.workflow_hash = Some("abc".into());
        cr.spec.set("Message", "tampered");
        store.update_status(&cr).await.unwrap();

        let stored = store
            .get_custom_resource(&cr.key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status.workflow_hash.as_deref(), Some("abc"));
        assert_eq!(stored.spec.get("Message"), Some("hi"));
        assert_eq!(stored.metadata.resource_version, Some(2));
    }

    #[tokio::test]
    async fn test_update_status_on_deleted_cr_is_not_found() {
        let store = MemoryStore::new();
        let cr = store
            .put_custom_resource(CustomResource::new("batch", "job"))
            .await;
        store.delete_custom_resource(&cr.key()).await;

        let err = store.update_status(&cr).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_workflow_is_create_if_absent() {
        let store = MemoryStore::new();
        let wf = workflow("batch", "job-workflow-abc");
        store.create_workflow(&wf).await.unwrap();

        let err = store.create_workflow(&wf).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.workflow_count().await, 1);
    }

    #[tokio::test]
    async fn test_set_workflow_phase() {
        let store = MemoryStore::new();
        let wf = workflow("batch", "job-workflow-abc");
        store.create_workflow(&wf).await.unwrap();

        assert!(store.set_workflow_phase(&wf.key(), WorkflowPhase::Running).await);
        let stored = store.get_workflow(&wf.key()).await.unwrap().unwrap();
        assert_eq!(stored.phase(), WorkflowPhase::Running);

        let missing = NamespacedName::new("batch", "nope");
        assert!(!store.set_workflow_phase(&missing, WorkflowPhase::Failed).await);
    }
}
