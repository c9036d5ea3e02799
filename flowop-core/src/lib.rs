//! flowop-core — a reconciler keeping custom resources in sync with batch
//! workflows.
//!
//! The crate implements one controller instance's worth of logic: load a
//! workflow template from a manifest, then for every delivered CR identity
//! run an observe-compare-act cycle — fingerprint the spec, create or adopt
//! the matching workflow, poll its phase, and return a scheduling directive.
//! The surrounding orchestration substrate (object store, watch machinery,
//! work queue) stays behind the [`ResourceStore`] trait.
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowop_core::{manifest, MemoryStore, NamespacedName, Reconciler};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = manifest::read_manifest("workflow.yaml")?;
//! let templates = manifest::parse_templates(&bytes)?;
//!
//! let store = Arc::new(MemoryStore::new());
//! let reconciler = Reconciler::from_templates(store, templates)
//!     .expect("manifest yielded no workflow template");
//!
//! let outcome = reconciler
//!     .reconcile(&NamespacedName::new("batch", "nightly-report"))
//!     .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod fingerprint;
pub mod manifest;
pub mod materialize;
pub mod reconciler;
pub mod resources;
pub mod store;
pub mod store_memory;

pub use fingerprint::fingerprint;
pub use manifest::{load_templates, parse_templates, read_manifest, ManifestError};
pub use materialize::{materialize, workflow_name};
pub use reconciler::{
    reconcile_request_for, ReconcileError, ReconcileOutcome, Reconciler, POLL_INTERVAL,
};
pub use resources::{
    Arguments, CustomResource, CustomResourceStatus, NamespacedName, ObjectMeta, OwnerReference,
    Parameter, SpecFields, TemplateMeta, Workflow, WorkflowPhase, WorkflowSpec, WorkflowStatus,
    WorkflowTemplate, CR_API_VERSION, CR_KIND, CR_LABEL,
};
pub use store::{ResourceStore, StoreError};
pub use store_memory::MemoryStore;
