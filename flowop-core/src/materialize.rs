//! Workflow Materialization
//!
//! Pure builder turning a template plus a custom resource into a concrete
//! workflow object. Nothing is submitted to storage here; the reconciler owns
//! that side effect.

use std::collections::BTreeMap;

use crate::resources::{
    Arguments, CustomResource, ObjectMeta, OwnerReference, Parameter, SpecFields, Workflow,
    WorkflowStatus, WorkflowTemplate, CR_API_VERSION, CR_KIND, CR_LABEL,
};

/// Deterministic workflow name for a CR + fingerprint pair. Provenance is
/// readable from the name, and an unchanged fingerprint always resolves to
/// the same identity.
pub fn workflow_name(cr_name: &str, fingerprint: &str) -> String {
    format!("{cr_name}-workflow-{fingerprint}")
}

/// Instantiate a workflow from the template for this custom resource.
///
/// The template spec is deep-copied, so repeated materializations never share
/// mutable state. The instance carries the deterministic name, the CR-name
/// label for reverse lookup, and a controller owner reference back to the CR.
pub fn materialize(
    template: &WorkflowTemplate,
    cr: &CustomResource,
    fingerprint: &str,
) -> Workflow {
    let mut spec = template.spec.clone();
    spec.arguments = Arguments {
        parameters: bind_parameters(&template.spec.arguments.parameters, &cr.spec),
    };

    let mut labels = BTreeMap::new();
    labels.insert(CR_LABEL.to_string(), cr.metadata.name.clone());

    Workflow {
        api_version: template.api_version.clone(),
        kind: template.kind.clone(),
        metadata: ObjectMeta {
            name: workflow_name(&cr.metadata.name, fingerprint),
            namespace: cr.metadata.namespace.clone(),
            labels,
            owner_references: vec![controller_reference(cr)],
            ..ObjectMeta::default()
        },
        spec,
        status: WorkflowStatus::default(),
    }
}

/// Owner reference marking the CR as the workflow's managing controller.
fn controller_reference(cr: &CustomResource) -> OwnerReference {
    OwnerReference {
        api_version: CR_API_VERSION.to_string(),
        kind: CR_KIND.to_string(),
        name: cr.metadata.name.clone(),
        uid: cr.metadata.uid,
        controller: true,
    }
}

/// Bind CR spec fields onto the template's declared parameters.
///
/// A field binds to the parameter whose name matches case-insensitively, and
/// its value is lowercased on the way through. Fields with no declared
/// counterpart are skipped; the argument list is replaced wholesale, so
/// declared parameters nothing bound to are dropped from the instance.
fn bind_parameters(declared: &[Parameter], fields: &SpecFields) -> Vec<Parameter> {
    let mut parameters = Vec::new();
    for (name, value) in fields.iter() {
        let Some(parameter) = declared.iter().find(|p| p.name.eq_ignore_ascii_case(name)) else {
            continue;
        };
        parameters.push(Parameter {
            name: parameter.name.clone(),
            value: Some(value.to_lowercase()),
        });
    }
    parameters
}
