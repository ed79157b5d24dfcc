use crate::descriptor::FieldDescriptor;
use crate::error::SchemaError;
use crate::view::ViewDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Page-level document: the fields of one entity type, an optional detail
/// view layout, and optional seed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub view: Vec<ViewDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Value>,
}

impl FormSchema {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(json)?;
        schema.check()?;
        Ok(schema)
    }

    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Every field needs a path of its own.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.path.trim().is_empty() {
                return Err(SchemaError::EmptyPath(field.label.clone()));
            }
            if !seen.insert(field.path.as_str()) {
                return Err(SchemaError::DuplicatePath(field.path.clone()));
            }
        }
        Ok(())
    }

    /// The explicit view layout, or one derived from the form fields.
    pub fn view_descriptors(&self) -> Vec<ViewDescriptor> {
        if self.view.is_empty() {
            self.fields.iter().map(ViewDescriptor::from).collect()
        } else {
            self.view.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_schema_with_initial_data() {
        let schema = FormSchema::from_json(
            r#"{
                "title": "New lead",
                "fields": [
                    {"label": "Name", "path": "name", "kind": "text", "required": true},
                    {"label": "Phone", "path": "phone", "kind": "phone"}
                ],
                "initialData": {"name": "Kiran"}
            }"#,
        )
        .expect("schema");
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.view_descriptors().len(), 2);
        assert_eq!(schema.initial_data, Some(serde_json::json!({"name": "Kiran"})));
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let err = FormSchema::from_json(
            r#"{"fields": [
                {"label": "A", "path": "x", "kind": "text"},
                {"label": "B", "path": "x", "kind": "email"}
            ]}"#,
        )
        .expect_err("duplicate");
        assert!(matches!(err, SchemaError::DuplicatePath(p) if p == "x"));
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = FormSchema::from_json(r#"{"fields": [{"label": "A", "path": " ", "kind": "text"}]}"#)
            .expect_err("empty path");
        assert!(matches!(err, SchemaError::EmptyPath(_)));
    }
}
