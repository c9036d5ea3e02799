//! Resource Schemas
//!
//! Wire types for the custom resource, the workflow it drives, and the
//! template a workflow is instantiated from. The reconciler persists nothing
//! beyond these objects; everything it remembers between cycles lives in
//! `CustomResourceStatus`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// API version stamped on owner references pointing back at a custom resource.
pub const CR_API_VERSION: &str = "flowop.dev/v1alpha1";

/// Kind stamped on owner references pointing back at a custom resource.
pub const CR_KIND: &str = "FlowJob";

/// Label carried by every materialized workflow, holding the owning custom
/// resource's name for reverse lookup during event routing.
pub const CR_LABEL: &str = "cr";

// ─── Identity ─────────────────────────────────────────────────

/// Namespace + name pair identifying an object within the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ─── Object metadata ──────────────────────────────────────────

/// Metadata common to stored objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    /// Store-assigned identity, set on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    /// Optimistic-concurrency token. The store bumps it on every write and
    /// rejects conditional writes carrying a stale value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// The namespace + name identity of this object.
    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }
}

/// Reference from an owned object back to its owner. The substrate cascades
/// deletion through these; the reconciler only ever stamps them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    /// True when the owner is the managing controller for the object.
    #[serde(default)]
    pub controller: bool,
}

// ─── Custom resource ──────────────────────────────────────────

/// User-declared desired state tracked by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomResource {
    pub metadata: ObjectMeta,
    /// Open set of string-valued desired-state fields.
    #[serde(default)]
    pub spec: SpecFields,
    /// Observed state. Written only by the reconciler, through the status
    /// subresource.
    #[serde(default)]
    pub status: CustomResourceStatus,
}

impl CustomResource {
    /// A bare custom resource with the given identity and an empty spec.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..ObjectMeta::default()
            },
            spec: SpecFields::default(),
            status: CustomResourceStatus::default(),
        }
    }

    /// Add a spec field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.set(name, value);
        self
    }

    pub fn key(&self) -> NamespacedName {
        self.metadata.namespaced_name()
    }
}

/// Named string fields making up a custom resource's spec.
///
/// Backed by an ordered map so iteration order — and therefore the spec
/// fingerprint — is reproducible across processes and restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecFields(BTreeMap<String, String>);

impl SpecFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Fields in stable (name-ordered) iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for SpecFields {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Observed state the reconciler persists between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceStatus {
    /// Name of the workflow currently tracking the spec, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    /// Fingerprint of the spec that produced that workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_hash: Option<String>,
    /// Last phase observed on the tracked workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_status: Option<WorkflowPhase>,
    /// Incremented on every workflow creation, so a regenerated workflow gets
    /// a fresh fingerprint (and name) even for an unchanged spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_count: Option<i32>,
}

// ─── Workflow ─────────────────────────────────────────────────

/// Execution phase reported by the external workflow engine. The reconciler
/// only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Error => "Error",
        }
    }

    /// Whether the engine is done with the workflow, for better or worse.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Error)
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External batch-execution resource instantiated from a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkflowSpec,
    #[serde(default)]
    pub status: WorkflowStatus,
}

impl Workflow {
    pub fn key(&self) -> NamespacedName {
        self.metadata.namespaced_name()
    }

    /// Observed phase; a workflow the engine has not picked up yet reads as
    /// Pending.
    pub fn phase(&self) -> WorkflowPhase {
        self.status.phase.unwrap_or(WorkflowPhase::Pending)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub arguments: Arguments,
    /// Step definitions. Opaque here — only the engine interprets them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Arguments {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

/// A named workflow argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<WorkflowPhase>,
}

// ─── Workflow template ────────────────────────────────────────

/// Immutable blueprint a workflow instance is materialized from. Loaded once
/// at startup and owned by the reconciler for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: TemplateMeta,
    #[serde(default)]
    pub spec: WorkflowSpec,
}

impl WorkflowTemplate {
    /// Parameter names the template declares.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.spec.arguments.parameters.iter().map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_name_display() {
        let key = NamespacedName::new("batch", "nightly-report");
        assert_eq!(key.to_string(), "batch/nightly-report");
    }

    #[test]
    fn test_spec_fields_iterate_in_name_order() {
        let mut fields = SpecFields::new();
        fields.set("Zeta", "1");
        fields.set("Alpha", "2");
        fields.set("Mid", "3");

        let names: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn test_phase_serializes_capitalized() {
        let json = serde_json::to_string(&WorkflowPhase::Succeeded).unwrap();
        assert_eq!(json, "\"Succeeded\"");
    }

    #[test]
    fn test_unset_phase_reads_as_pending() {
        let wf = Workflow {
            api_version: None,
            kind: None,
            metadata: ObjectMeta::default(),
            spec: WorkflowSpec::default(),
            status: WorkflowStatus::default(),
        };
        assert_eq!(wf.phase(), WorkflowPhase::Pending);
    }

    #[test]
    fn test_status_roundtrip_skips_empty_fields() {
        let status = CustomResourceStatus::default();
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "{}");

        let full = CustomResourceStatus {
            workflow_name: Some("job-workflow-abc".into()),
            workflow_hash: Some("abc".into()),
            workflow_status: Some(WorkflowPhase::Running),
            collision_count: Some(2),
        };
        let json = serde_json::to_string(&full).unwrap();
        let back: CustomResourceStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, full);
    }
}
