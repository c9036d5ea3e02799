//! Manifest Loading
//!
//! A manifest block is either a single strict JSON document or a strict
//! multi-document YAML stream; strict means unknown fields are rejected in
//! both paths. JSON is attempted first, then the YAML fallback. A block that
//! parses as neither is an explicit error carrying both parse failures, so a
//! malformed manifest never degrades silently into "no templates".

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::resources::WorkflowTemplate;

#[derive(Debug, Error)]
pub enum ManifestError {
    /// Could not read the manifest bytes at all. Fatal during initialization:
    /// without a usable template there is no controller to run.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The block parsed as neither strict JSON nor a strict YAML stream.
    #[error("manifest block is neither strict JSON ({json}) nor strict YAML ({yaml})")]
    UnrecognizedFormat { json: String, yaml: String },
}

/// Parse one raw manifest block into zero or more templates.
pub fn parse_templates(bytes: &[u8]) -> Result<Vec<WorkflowTemplate>, ManifestError> {
    let json_err = match serde_json::from_slice::<WorkflowTemplate>(bytes) {
        Ok(template) => return Ok(vec![template]),
        Err(e) => e,
    };

    match split_yaml_stream(bytes) {
        Ok(templates) => Ok(templates),
        Err(yaml_err) => Err(ManifestError::UnrecognizedFormat {
            json: json_err.to_string(),
            yaml: yaml_err.to_string(),
        }),
    }
}

/// Parse a multi-document YAML stream, strictly, in document order.
fn split_yaml_stream(bytes: &[u8]) -> Result<Vec<WorkflowTemplate>, serde_yaml::Error> {
    let mut templates = Vec::new();
    for document in serde_yaml::Deserializer::from_slice(bytes) {
        templates.push(WorkflowTemplate::deserialize(document)?);
    }
    Ok(templates)
}

/// Fold `parse_templates` over several blocks, keeping input order.
pub fn load_templates(bodies: &[Vec<u8>]) -> Result<Vec<WorkflowTemplate>, ManifestError> {
    let mut templates = Vec::new();
    for body in bodies {
        templates.extend(parse_templates(body)?);
    }
    Ok(templates)
}

/// Read one manifest file into raw bytes.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<u8>, ManifestError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JSON_MANIFEST: &str = r#"{
        "apiVersion": "workflows.dev/v1alpha1",
        "kind": "Workflow",
        "metadata": {"generateName": "echo-"},
        "spec": {
            "entrypoint": "main",
            "arguments": {"parameters": [{"name": "message", "value": "hello"}]}
        }
    }"#;

    const YAML_MANIFEST: &str = r#"
apiVersion: workflows.dev/v1alpha1
kind: Workflow
metadata:
  generateName: echo-
spec:
  entrypoint: main
  arguments:
    parameters:
      - name: message
        value: hello
---
apiVersion: workflows.dev/v1alpha1
kind: Workflow
metadata:
  generateName: second-
spec:
  entrypoint: main
"#;

    #[test]
    fn test_strict_json_single_document() {
        let templates = parse_templates(JSON_MANIFEST.as_bytes()).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(
            templates[0].parameter_names().collect::<Vec<_>>(),
            vec!["message"]
        );
    }

    #[test]
    fn test_yaml_stream_yields_all_documents() {
        let templates = parse_templates(YAML_MANIFEST.as_bytes()).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].metadata.generate_name.as_deref(), Some("echo-"));
        assert_eq!(
            templates[1].metadata.generate_name.as_deref(),
            Some("second-")
        );
    }

    #[test]
    fn test_unknown_fields_rejected_in_both_formats() {
        let json = r#"{"spec": {}, "surprise": true}"#;
        let err = parse_templates(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestError::UnrecognizedFormat { .. }));

        let yaml = "spec: {}\nsurprise: true\n";
        let err = parse_templates(yaml.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestError::UnrecognizedFormat { .. }));
    }

    #[test]
    fn test_garbage_reports_both_parse_failures() {
        let err = parse_templates(b"not a manifest at all").unwrap_err();
        let ManifestError::UnrecognizedFormat { json, yaml } = err else {
            panic!("expected UnrecognizedFormat");
        };
        assert!(!json.is_empty());
        assert!(!yaml.is_empty());
    }

    #[test]
    fn test_empty_stream_yields_no_templates() {
        let templates = parse_templates(b"").unwrap();
        assert!(templates.is_empty());
    }

    #[test]
    fn test_load_templates_keeps_block_order() {
        let bodies = vec![
            YAML_MANIFEST.as_bytes().to_vec(),
            JSON_MANIFEST.as_bytes().to_vec(),
        ];
        let templates = load_templates(&bodies).unwrap();
        assert_eq!(templates.len(), 3);
        assert_eq!(templates[2].metadata.generate_name.as_deref(), Some("echo-"));
    }

    #[test]
    fn test_read_manifest_roundtrip_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(JSON_MANIFEST.as_bytes()).unwrap();
        let bytes = read_manifest(file.path()).unwrap();
        assert_eq!(bytes, JSON_MANIFEST.as_bytes());

        let err = read_manifest("/nonexistent/workflow.yaml").unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
