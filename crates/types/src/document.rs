//! Wire-format schema for a workflow JSON document (§6).
//!
//! These types mirror the on-disk shape byte-for-byte (field names, casing,
//! optionality) and carry no derived state. The loader decodes into these
//! structs; the populator translates them into the runtime model in
//! `flowgraph-engine`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level JSON shape of a workflow document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Project", default)]
    pub project: Option<String>,
    #[serde(rename = "Zone", default)]
    pub zone: Option<String>,
    #[serde(rename = "GCSPath", default)]
    pub gcs_path: Option<String>,
    #[serde(rename = "OAuthPath", default)]
    pub oauth_path: Option<String>,
    #[serde(rename = "Vars", default)]
    pub vars: IndexMap<String, VarEntry>,
    #[serde(rename = "Sources", default)]
    pub sources: IndexMap<String, String>,
    #[serde(rename = "Steps", default)]
    pub steps: IndexMap<String, StepDocument>,
    #[serde(rename = "Dependencies", default)]
    pub dependencies: IndexMap<String, Vec<String>>,
}

/// A `Vars` entry, in either its short (bare string) or long (record) form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarEntry {
    Short(String),
    Full {
        #[serde(rename = "Value", default)]
        value: Option<String>,
        #[serde(rename = "Required", default)]
        required: bool,
        #[serde(rename = "Description", default)]
        description: Option<String>,
    },
}

impl VarEntry {
    pub fn value(&self) -> Option<&str> {
        match self {
            VarEntry::Short(value) => Some(value.as_str()),
            VarEntry::Full { value, .. } => value.as_deref(),
        }
    }

    pub fn required(&self) -> bool {
        match self {
            VarEntry::Short(_) => false,
            VarEntry::Full { required, .. } => *required,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            VarEntry::Short(_) => None,
            VarEntry::Full { description, .. } => description.as_deref(),
        }
    }
}

/// A reference to a nested workflow document, used by both `SubWorkflow`
/// and `IncludeWorkflow` step kinds — the composition semantics differ,
/// the reference shape does not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NestedWorkflowRef {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Vars", default)]
    pub vars: IndexMap<String, VarEntry>,
}

/// The eight real-step kinds named in §3, plus `Timeout`. Exactly one of
/// the eight payload fields may be set; anything else is a schema error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDocument {
    #[serde(rename = "Timeout", default)]
    pub timeout: Option<String>,
    #[serde(rename = "CreateDisks", default, skip_serializing_if = "Option::is_none")]
    pub create_disks: Option<Value>,
    #[serde(rename = "CreateInstances", default, skip_serializing_if = "Option::is_none")]
    pub create_instances: Option<Value>,
    #[serde(rename = "WaitForInstancesSignal", default, skip_serializing_if = "Option::is_none")]
    pub wait_for_instances_signal: Option<Value>,
    #[serde(rename = "CreateImages", default, skip_serializing_if = "Option::is_none")]
    pub create_images: Option<Value>,
    #[serde(rename = "DeleteResources", default, skip_serializing_if = "Option::is_none")]
    pub delete_resources: Option<Value>,
    #[serde(rename = "CopyGCSObjects", default, skip_serializing_if = "Option::is_none")]
    pub copy_gcs_objects: Option<Value>,
    #[serde(rename = "SubWorkflow", default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow: Option<NestedWorkflowRef>,
    #[serde(rename = "IncludeWorkflow", default, skip_serializing_if = "Option::is_none")]
    pub include_workflow: Option<NestedWorkflowRef>,
}

impl StepDocument {
    /// Names of every real-step payload field that is present, in
    /// declaration order. Exactly one is expected by §4.3.
    pub fn set_variant_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.create_disks.is_some() {
            names.push("CreateDisks");
        }
        if self.create_instances.is_some() {
            names.push("CreateInstances");
        }
        if self.wait_for_instances_signal.is_some() {
            names.push("WaitForInstancesSignal");
        }
        if self.create_images.is_some() {
            names.push("CreateImages");
        }
        if self.delete_resources.is_some() {
            names.push("DeleteResources");
        }
        if self.copy_gcs_objects.is_some() {
            names.push("CopyGCSObjects");
        }
        if self.sub_workflow.is_some() {
            names.push("SubWorkflow");
        }
        if self.include_workflow.is_some() {
            names.push("IncludeWorkflow");
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_entry_parses_both_forms() {
        let short: VarEntry = serde_json::from_str("\"value\"").unwrap();
        assert_eq!(short.value(), Some("value"));
        assert!(!short.required());

        let full: VarEntry = serde_json::from_str(r#"{"Value":"v","Required":true,"Description":"d"}"#).unwrap();
        assert_eq!(full.value(), Some("v"));
        assert!(full.required());
        assert_eq!(full.description(), Some("d"));
    }

    #[test]
    fn step_document_reports_set_variants() {
        let doc: StepDocument = serde_json::from_str(r#"{"CreateDisks":{},"Timeout":"5m"}"#).unwrap();
        assert_eq!(doc.set_variant_names(), vec!["CreateDisks"]);
        assert_eq!(doc.timeout.as_deref(), Some("5m"));
    }

    #[test]
    fn step_document_detects_multiple_variants() {
        let doc: StepDocument = serde_json::from_str(r#"{"CreateDisks":{},"CreateImages":{}}"#).unwrap();
        assert_eq!(doc.set_variant_names().len(), 2);
    }

    #[test]
    fn workflow_document_round_trips_top_level_fields() {
        let json = r#"{
            "Name": "build-image",
            "Project": "my-project",
            "Steps": {}
        }"#;
        let doc: WorkflowDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.name.as_deref(), Some("build-image"));
        assert_eq!(doc.project.as_deref(), Some("my-project"));
        assert!(doc.steps.is_empty());
    }
}
