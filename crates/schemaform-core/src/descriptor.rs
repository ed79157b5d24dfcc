use serde::{Deserialize, Deserializer, Serialize};
use crate::others::is_sentinel;
use serde_json::Value;

/// One field of a form: where its value lives and how it is edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub label: String,
    pub path: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl FieldDescriptor {
    pub fn new(label: impl Into<String>, path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            kind,
            required: false,
            visibility: None,
        }
    }

    pub fn text(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(label, path, FieldKind::Text { placeholder: None })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn visible_when(mut self, rule: DependencyRule) -> Self {
        self.visibility = Some(match self.visibility.take() {
            None => Visibility::Rule(rule),
            Some(Visibility::Rule(prev)) => Visibility::All(vec![prev, rule]),
            Some(Visibility::All(mut rules)) => {
                rules.push(rule);
                Visibility::All(rules)
            }
        });
        self
    }

    pub fn is_file_backed(&self) -> bool {
        matches!(self.kind, FieldKind::File { .. } | FieldKind::FileArray { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    Email,
    Phone,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Textarea {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<u32>,
    },
    Date,
    Select {
        options: Vec<SelectOption>,
        /// Adds the `OTHERS` entry that switches the field to free text.
        #[serde(default)]
        allow_others: bool,
    },
    MultiSelect {
        options: Vec<SelectOption>,
    },
    Checkbox {
        #[serde(default = "default_true_value")]
        true_value: Value,
        #[serde(default = "default_false_value")]
        false_value: Value,
    },
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder_hint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accept: Option<String>,
    },
    FileArray {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder_hint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accept: Option<String>,
    },
    RepeatableGroup {
        item: GroupItemKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        add_label: Option<String>,
    },
}

fn default_true_value() -> Value {
    Value::Bool(true)
}

fn default_false_value() -> Value {
    Value::Bool(false)
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Number { .. } => "number",
            FieldKind::Textarea { .. } => "textarea",
            FieldKind::Date => "date",
            FieldKind::Select { .. } => "select",
            FieldKind::MultiSelect { .. } => "multi_select",
            FieldKind::Checkbox { .. } => "checkbox",
            FieldKind::File { .. } => "file",
            FieldKind::FileArray { .. } => "file_array",
            FieldKind::RepeatableGroup { .. } => "repeatable_group",
        }
    }

    pub fn options(&self) -> &[SelectOption] {
        match self {
            FieldKind::Select { options, .. } | FieldKind::MultiSelect { options } => options,
            FieldKind::RepeatableGroup {
                item: GroupItemKind::Select { options },
                ..
            } => options,
            _ => &[],
        }
    }

    /// Whether picking `OTHERS` switches this field to free text. Listing the
    /// sentinel as an option counts the same as `allowOthers`.
    pub fn offers_others(&self) -> bool {
        match self {
            FieldKind::Select {
                options,
                allow_others,
            } => *allow_others || options.iter().any(|option| is_sentinel(&option.value)),
            _ => false,
        }
    }
}

/// Shape shared by every item of a repeatable group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GroupItemKind {
    Text,
    Select {
        options: Vec<SelectOption>,
    },
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder_hint: Option<String>,
    },
}

impl GroupItemKind {
    /// Value a freshly appended item starts with.
    pub fn empty_value(&self) -> Value {
        match self {
            GroupItemKind::Text | GroupItemKind::Select { .. } => Value::String(String::new()),
            GroupItemKind::File { .. } => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// When a field is shown. A list of rules must all hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Visibility {
    All(Vec<DependencyRule>),
    Rule(DependencyRule),
}

impl Visibility {
    pub fn rules(&self) -> &[DependencyRule] {
        match self {
            Visibility::All(rules) => rules,
            Visibility::Rule(rule) => std::slice::from_ref(rule),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRule {
    pub target_path: String,
    #[serde(flatten)]
    pub mode: DependencyMode,
}

impl DependencyRule {
    pub fn equals_one_of(target_path: impl Into<String>, allowed: Vec<Value>) -> Self {
        Self {
            target_path: target_path.into(),
            mode: DependencyMode::EqualsOneOf { allowed },
        }
    }

    pub fn not_equals(target_path: impl Into<String>, excluded: impl Into<Value>) -> Self {
        Self {
            target_path: target_path.into(),
            mode: DependencyMode::NotEquals {
                excluded: excluded.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DependencyMode {
    EqualsOneOf {
        #[serde(deserialize_with = "one_or_many")]
        allowed: Vec<Value>,
    },
    NotEquals {
        excluded: Value,
    },
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        single => vec![single],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_select_with_others() {
        let raw = json!({
            "label": "Source",
            "path": "lead.source",
            "kind": "select",
            "options": [{"value": "WEB", "label": "Website"}],
            "allowOthers": true,
            "required": true
        });
        let field: FieldDescriptor = serde_json::from_value(raw).expect("descriptor");
        assert!(field.required);
        assert_eq!(
            field.kind,
            FieldKind::Select {
                options: vec![SelectOption::new("WEB", "Website")],
                allow_others: true,
            }
        );
    }

    #[test]
    fn parse_visibility_scalar_and_list_forms() {
        let single: FieldDescriptor = serde_json::from_value(json!({
            "label": "State",
            "path": "state",
            "kind": "text",
            "visibility": {"targetPath": "country", "mode": "equals_one_of", "allowed": "INDIA"}
        }))
        .expect("single rule");
        assert_eq!(
            single.visibility,
            Some(Visibility::Rule(DependencyRule::equals_one_of(
                "country",
                vec![json!("INDIA")]
            )))
        );

        let all: FieldDescriptor = serde_json::from_value(json!({
            "label": "Other",
            "path": "other",
            "kind": "text",
            "visibility": [
                {"targetPath": "a", "mode": "equals_one_of", "allowed": ["X", "Y"]},
                {"targetPath": "b", "mode": "not_equals", "excluded": null}
            ]
        }))
        .expect("rule list");
        let rules = all.visibility.as_ref().map(Visibility::rules).unwrap_or_default();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1], DependencyRule::not_equals("b", Value::Null));
    }

    #[test]
    fn checkbox_defaults_to_bool_values() {
        let field: FieldDescriptor = serde_json::from_value(json!({
            "label": "Hot lead",
            "path": "hot",
            "kind": "checkbox"
        }))
        .expect("checkbox");
        assert_eq!(
            field.kind,
            FieldKind::Checkbox {
                true_value: json!(true),
                false_value: json!(false),
            }
        );
    }

    #[test]
    fn group_item_empty_values() {
        assert_eq!(GroupItemKind::Text.empty_value(), json!(""));
        assert_eq!(GroupItemKind::File { folder_hint: None }.empty_value(), Value::Null);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = serde_json::from_value::<FieldDescriptor>(json!({
            "label": "X",
            "path": "x",
            "kind": "hologram"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn visible_when_accumulates_rules() {
        let field = FieldDescriptor::text("City", "city")
            .visible_when(DependencyRule::equals_one_of("country", vec![json!("INDIA")]))
            .visible_when(DependencyRule::not_equals("state", ""));
        assert_eq!(field.visibility.map(|v| v.rules().len()), Some(2));
    }
}
