//! Read-only detail views.
//!
//! [`resolve_view`] turns a view layout and a fully resolved record into
//! display entries. Nothing here mutates the record.

use crate::descriptor::{FieldDescriptor, FieldKind, GroupItemKind, SelectOption, Visibility};
use crate::media::{FileClass, file_name_from_url};
use crate::path::{get_path, is_blank};
use crate::resolver::is_visible;
use crate::search::option_label;
use crate::validate::parse_date;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    pub label: String,
    /// Ignored by [`ViewKind::SemesterGroup`], which scans the record root.
    #[serde(default)]
    pub path: String,
    #[serde(flatten)]
    pub kind: ViewKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl ViewDescriptor {
    pub fn new(label: impl Into<String>, path: impl Into<String>, kind: ViewKind) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            kind,
            visibility: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ViewKind {
    Text,
    Number,
    Phone,
    Email,
    Textarea,
    Select {
        options: Vec<SelectOption>,
    },
    MultiSelect {
        options: Vec<SelectOption>,
    },
    Checkbox {
        #[serde(default = "default_true_value")]
        true_value: Value,
    },
    Boolean,
    Date,
    DateTime,
    DateArray,
    ArrayJoin {
        #[serde(default = "default_separator")]
        separator: String,
    },
    ObjectArray {
        #[serde(default = "default_message_key")]
        message_key: String,
        #[serde(default = "default_time_key")]
        time_key: String,
        #[serde(default = "default_list_key")]
        list_key: String,
    },
    Link,
    File,
    FileArray,
    SemesterGroup {
        prefix: String,
    },
    RepeatableGroup,
}

fn default_true_value() -> Value {
    Value::Bool(true)
}

fn default_separator() -> String {
    ", ".to_string()
}

fn default_message_key() -> String {
    "message".to_string()
}

fn default_time_key() -> String {
    "time".to_string()
}

fn default_list_key() -> String {
    "items".to_string()
}

impl From<&FieldDescriptor> for ViewDescriptor {
    fn from(field: &FieldDescriptor) -> Self {
        let kind = match &field.kind {
            FieldKind::Text { .. } => ViewKind::Text,
            FieldKind::Email => ViewKind::Email,
            FieldKind::Phone => ViewKind::Phone,
            FieldKind::Number { .. } => ViewKind::Number,
            FieldKind::Textarea { .. } => ViewKind::Textarea,
            FieldKind::Date => ViewKind::Date,
            FieldKind::Select { options, .. } => ViewKind::Select {
                options: options.clone(),
            },
            FieldKind::MultiSelect { options } => ViewKind::MultiSelect {
                options: options.clone(),
            },
            FieldKind::Checkbox { true_value, .. } => ViewKind::Checkbox {
                true_value: true_value.clone(),
            },
            FieldKind::File { .. } => ViewKind::File,
            FieldKind::FileArray { .. } => ViewKind::FileArray,
            FieldKind::RepeatableGroup {
                item: GroupItemKind::File { .. },
                ..
            } => ViewKind::FileArray,
            FieldKind::RepeatableGroup {
                item: GroupItemKind::Select { options },
                ..
            } => ViewKind::MultiSelect {
                options: options.clone(),
            },
            FieldKind::RepeatableGroup { .. } => ViewKind::RepeatableGroup,
        };
        Self {
            label: field.label.clone(),
            path: field.path.clone(),
            kind,
            visibility: field.visibility.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRef {
    pub url: String,
    pub file_name: String,
    pub class: FileClass,
}

impl FileRef {
    pub fn from_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            file_name: file_name_from_url(url),
            class: FileClass::classify(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub message: Option<String>,
    pub time: Option<String>,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DisplayValue {
    Empty,
    Text(String),
    Boolean(bool),
    List(Vec<String>),
    Link(String),
    Cards(Vec<Card>),
    Files(Vec<FileRef>),
    /// Key and display text of every key found by a prefix scan.
    Group(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEntry {
    pub label: String,
    pub path: String,
    pub value: DisplayValue,
}

/// Display entries for every visible descriptor, in layout order.
pub fn resolve_view(descriptors: &[ViewDescriptor], data: &Value) -> Vec<ViewEntry> {
    descriptors
        .iter()
        .filter(|view| is_visible(view.visibility.as_ref(), data))
        .map(|view| ViewEntry {
            label: view.label.clone(),
            path: view.path.clone(),
            value: display_value(view, data),
        })
        .collect()
}

pub fn display_value(view: &ViewDescriptor, data: &Value) -> DisplayValue {
    if let ViewKind::SemesterGroup { prefix } = &view.kind {
        return semester_group(data, prefix);
    }
    let value = get_path(data, &view.path);
    if is_blank(value) {
        return match view.kind {
            ViewKind::Boolean | ViewKind::Checkbox { .. } => DisplayValue::Boolean(false),
            _ => DisplayValue::Empty,
        };
    }
    let Some(value) = value else {
        return DisplayValue::Empty;
    };

    match &view.kind {
        ViewKind::Select { options } => DisplayValue::Text(
            option_text(options, value).unwrap_or_else(|| scalar_text(value)),
        ),
        ViewKind::MultiSelect { options } => DisplayValue::List(
            list(value)
                .iter()
                .map(|v| option_text(options, v).unwrap_or_else(|| scalar_text(v)))
                .collect(),
        ),
        ViewKind::Checkbox { true_value } => DisplayValue::Boolean(value == true_value),
        ViewKind::Boolean => DisplayValue::Boolean(truthy(value)),
        ViewKind::Date => DisplayValue::Text(format_date(value)),
        ViewKind::DateTime => DisplayValue::Text(format_date_time(value)),
        ViewKind::DateArray => DisplayValue::List(list(value).iter().map(format_date).collect()),
        ViewKind::ArrayJoin { separator } => DisplayValue::Text(
            list(value)
                .iter()
                .filter(|v| !is_blank(Some(*v)))
                .map(scalar_text)
                .collect::<Vec<_>>()
                .join(separator),
        ),
        ViewKind::RepeatableGroup => DisplayValue::List(
            list(value)
                .iter()
                .filter(|v| !is_blank(Some(*v)))
                .map(scalar_text)
                .collect(),
        ),
        ViewKind::ObjectArray {
            message_key,
            time_key,
            list_key,
        } => DisplayValue::Cards(
            list(value)
                .iter()
                .filter(|v| v.is_object())
                .map(|item| card(item, message_key, time_key, list_key))
                .collect(),
        ),
        ViewKind::Link => DisplayValue::Link(scalar_text(value)),
        ViewKind::File | ViewKind::FileArray => DisplayValue::Files(
            list(value)
                .iter()
                .filter_map(Value::as_str)
                .filter(|url| !url.trim().is_empty())
                .map(FileRef::from_url)
                .collect(),
        ),
        ViewKind::Text
        | ViewKind::Number
        | ViewKind::Phone
        | ViewKind::Email
        | ViewKind::Textarea => DisplayValue::Text(scalar_text(value)),
        ViewKind::SemesterGroup { .. } => DisplayValue::Empty,
    }
}

/// A scalar is treated as a one-element list.
fn list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn option_text(options: &[SelectOption], value: &Value) -> Option<String> {
    option_label(options, value).map(str::to_string)
}

pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "Yes" } else { "No" }).to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "1"
        ),
        _ => false,
    }
}

/// `12 Mar 2024`; unparseable input is shown as-is.
pub fn format_date(value: &Value) -> String {
    let raw = scalar_text(value);
    parse_date(&raw)
        .map(|date| date.format("%d %b %Y").to_string())
        .unwrap_or(raw)
}

/// `12 Mar 2024, 14:05`; date-only input falls back to [`format_date`].
pub fn format_date_time(value: &Value) -> String {
    let raw = scalar_text(value);
    let trimmed = raw.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.format("%d %b %Y, %H:%M").to_string())
        .unwrap_or_else(|_| format_date(value))
}

fn card(item: &Value, message_key: &str, time_key: &str, list_key: &str) -> Card {
    let text = |key: &str| {
        item.get(key)
            .filter(|v| !is_blank(Some(*v)))
            .map(scalar_text)
    };
    Card {
        message: text(message_key),
        time: item
            .get(time_key)
            .filter(|v| !is_blank(Some(*v)))
            .map(format_date_time),
        items: item
            .get(list_key)
            .map(list)
            .unwrap_or_default()
            .iter()
            .filter(|v| !is_blank(Some(*v)))
            .map(scalar_text)
            .collect(),
    }
}

/// Every root key starting with `prefix`, in the record's own key order.
fn semester_group(data: &Value, prefix: &str) -> DisplayValue {
    let Some(root) = data.as_object() else {
        return DisplayValue::Empty;
    };
    let entries: Vec<(String, String)> = root
        .iter()
        .filter(|(key, value)| key.starts_with(prefix) && !is_blank(Some(*value)))
        .map(|(key, value)| (key.clone(), scalar_text(value)))
        .collect();
    if entries.is_empty() {
        DisplayValue::Empty
    } else {
        DisplayValue::Group(entries)
    }
}
