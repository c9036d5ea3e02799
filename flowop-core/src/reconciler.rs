//! Reconciliation State Machine
//!
//! Level-triggered control loop: the substrate delivers "re-examine this
//! identity" events with no diff attached, possibly duplicated or delayed, so
//! every branch here is safe to re-run from scratch. The only memory carried
//! between cycles is what `CustomResourceStatus` persists.
//!
//! One cycle observes the CR, compares its spec fingerprint against the last
//! tracked workflow, and either creates a fresh workflow, polls the existing
//! one, surfaces a failure, or does nothing — then hands a scheduling
//! directive back to the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::fingerprint::fingerprint;
use crate::materialize::materialize;
use crate::resources::{
    CustomResource, NamespacedName, Workflow, WorkflowPhase, WorkflowTemplate, CR_LABEL,
};
use crate::store::{ResourceStore, StoreError};

/// Poll interval while a tracked workflow is still Pending or Running.
/// Bounds status staleness without busy-polling the store.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Scheduling directive returned to the substrate. Never a blocking sleep —
/// the worker is free for other identities as soon as the cycle returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do for this cycle.
    Done,
    /// Re-deliver the same identity after the given delay.
    RequeueAfter(Duration),
}

/// Errors surfaced from one reconcile cycle.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Store failures propagate untouched; the substrate applies its own
    /// backoff before re-delivering the identity.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The tracked workflow ended in a failure phase. Not retried internally:
    /// a replacement workflow only appears once the spec (and with it the
    /// fingerprint) changes, so a persistently broken template is never
    /// masked by silent re-runs.
    #[error("workflow {name} failed with phase {phase}")]
    WorkflowFailed { name: String, phase: WorkflowPhase },

    /// The caller-supplied deadline expired before the cycle finished.
    #[error("reconcile of {key} exceeded the {timeout:?} deadline")]
    DeadlineExceeded {
        key: NamespacedName,
        timeout: Duration,
    },
}

/// Reconciler for one controller instance: one workflow template, one store.
///
/// The template is owned here and handed in at construction; there is no
/// process-wide template holder. Cheap to share behind an `Arc` across
/// per-identity worker tasks.
pub struct Reconciler<S> {
    store: Arc<S>,
    template: WorkflowTemplate,
}

impl<S: ResourceStore> Reconciler<S> {
    pub fn new(store: Arc<S>, template: WorkflowTemplate) -> Self {
        Self { store, template }
    }

    /// Registration step. Only the first loaded template is used — one
    /// template per controller instance — and with no template at all there
    /// is no controller to run, so registration declines.
    pub fn from_templates(store: Arc<S>, templates: Vec<WorkflowTemplate>) -> Option<Self> {
        let template = templates.into_iter().next()?;
        Some(Self::new(store, template))
    }

    pub fn template(&self) -> &WorkflowTemplate {
        &self.template
    }

    /// Run one reconcile cycle for the given CR identity.
    pub async fn reconcile(
        &self,
        key: &NamespacedName,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(mut cr) = self.store.get_custom_resource(key).await? else {
            // Deleted since the event was queued. Owned workflows are
            // cascaded away by the substrate; nothing to do here.
            debug!(%key, "custom resource gone, nothing to reconcile");
            return Ok(ReconcileOutcome::Done);
        };

        let desired = fingerprint(&cr.spec, cr.status.collision_count);
        if cr.status.workflow_hash.as_deref() != Some(desired.as_str()) {
            // Spec changed since the last tracked workflow, or nothing is
            // tracked yet. The previous workflow, if any, is abandoned in
            // place — never deleted.
            self.create_workflow(&mut cr).await?;
            return Ok(ReconcileOutcome::Done);
        }

        // The tracked workflow already reflects this spec; find it.
        let Some(name) = cr.status.workflow_name.clone() else {
            // Hash recorded without a name only happens under external
            // status tampering. Recover by starting a fresh workflow.
            self.create_workflow(&mut cr).await?;
            return Ok(ReconcileOutcome::Done);
        };
        let workflow_key = NamespacedName::new(cr.metadata.namespace.clone(), name);
        let Some(workflow) = self.store.get_workflow(&workflow_key).await? else {
            self.create_workflow(&mut cr).await?;
            return Ok(ReconcileOutcome::Done);
        };

        let phase = workflow.phase();
        self.record_observed_phase(&mut cr, phase).await?;

        match phase {
            WorkflowPhase::Pending | WorkflowPhase::Running => {
                debug!(%key, workflow = %workflow.metadata.name, %phase, "workflow in flight");
                Ok(ReconcileOutcome::RequeueAfter(POLL_INTERVAL))
            }
            WorkflowPhase::Succeeded => {
                debug!(%key, workflow = %workflow.metadata.name, "workflow succeeded");
                Ok(ReconcileOutcome::Done)
            }
            WorkflowPhase::Failed | WorkflowPhase::Error => {
                warn!(%key, workflow = %workflow.metadata.name, %phase, "workflow failed");
                Err(ReconcileError::WorkflowFailed {
                    name: workflow.metadata.name,
                    phase,
                })
            }
        }
    }

    /// Same cycle, bounded by a caller-supplied deadline.
    ///
    /// Every store operation is atomic from this side, so an expired deadline
    /// can drop the cycle mid-flight without leaving a half-written status:
    /// either the status write landed or it did not.
    pub async fn reconcile_with_deadline(
        &self,
        key: &NamespacedName,
        timeout: Duration,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match tokio::time::timeout(timeout, self.reconcile(key)).await {
            Ok(result) => result,
            Err(_) => Err(ReconcileError::DeadlineExceeded {
                key: key.clone(),
                timeout,
            }),
        }
    }

    /// Materialize and submit a workflow for the CR's current spec, then
    /// record it in status.
    async fn create_workflow(&self, cr: &mut CustomResource) -> Result<(), ReconcileError> {
        // Bump-or-init before fingerprinting: a retried creation gets a fresh
        // fingerprint and name, and a reverted spec never re-adopts a stale
        // abandoned workflow.
        cr.status.collision_count = Some(match cr.status.collision_count {
            None => 0,
            Some(count) => count + 1,
        });
        let fp = fingerprint(&cr.spec, cr.status.collision_count);
        let workflow = materialize(&self.template, cr, &fp);

        match self.store.create_workflow(&workflow).await {
            Ok(()) => {
                info!(cr = %cr.key(), workflow = %workflow.metadata.name, "created workflow");
            }
            // The name is a pure function of the fingerprint, so an existing
            // object under it is this exact workflow — a replayed cycle or a
            // lost status write from a previous one. Adopt it.
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(cr = %cr.key(), workflow = %workflow.metadata.name, "workflow already exists, adopting");
            }
            Err(e) => return Err(e.into()),
        }

        cr.status.workflow_hash = Some(fp);
        cr.status.workflow_name = Some(workflow.metadata.name.clone());
        cr.status.workflow_status = None;
        self.store.update_status(cr).await?;
        Ok(())
    }

    /// Keep `status.workflow_status` current with the engine-observed phase.
    /// Skips the write when nothing changed.
    async fn record_observed_phase(
        &self,
        cr: &mut CustomResource,
        phase: WorkflowPhase,
    ) -> Result<(), ReconcileError> {
        if cr.status.workflow_status == Some(phase) {
            return Ok(());
        }
        cr.status.workflow_status = Some(phase);
        self.store.update_status(cr).await?;
        Ok(())
    }
}

/// Map a workflow event back to the owning CR's reconcile request.
///
/// Only terminal Succeeded/Failed phases produce a request, recovered through
/// the `cr` label; any other phase, or a workflow without the label, yields
/// nothing.
pub fn reconcile_request_for(workflow: &Workflow) -> Option<NamespacedName> {
    match workflow.status.phase {
        Some(WorkflowPhase::Succeeded) | Some(WorkflowPhase::Failed) => {}
        _ => return None,
    }
    let cr_name = workflow.metadata.labels.get(CR_LABEL)?;
    Some(NamespacedName::new(
        workflow.metadata.namespace.clone(),
        cr_name.clone(),
    ))
}
