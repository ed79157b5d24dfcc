use crate::descriptor::{FieldDescriptor, FieldKind};
use crate::path::{get_path, is_blank};
use crate::resolver::visible_fields;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field path to the message shown under that field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: BTreeMap<String, String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(&self, path: &str) -> Option<&str> {
        self.errors.get(path).map(String::as_str)
    }
}

/// Validate every visible field. Hidden fields never block submission.
pub fn validate(descriptors: &[FieldDescriptor], state: &Value) -> ValidationReport {
    let errors = visible_fields(descriptors, state)
        .into_iter()
        .filter_map(|field| validate_field(field, state).map(|msg| (field.path.clone(), msg)))
        .collect();
    ValidationReport { errors }
}

pub fn validate_field(field: &FieldDescriptor, state: &Value) -> Option<String> {
    let value = get_path(state, &field.path);
    let label = &field.label;

    if let FieldKind::Checkbox { true_value, .. } = &field.kind {
        return (field.required && value != Some(true_value))
            .then(|| format!("{label} must be checked"));
    }

    let blank = match &field.kind {
        FieldKind::RepeatableGroup { .. } => value
            .and_then(Value::as_array)
            .is_none_or(|items| items.iter().all(|item| is_blank(Some(item)))),
        _ => is_blank(value),
    };
    if blank {
        return field.required.then(|| format!("{label} is required"));
    }
    let value = value?;

    match &field.kind {
        FieldKind::Number { min, max } => {
            let Some(n) = as_number(value) else {
                return Some(format!("{label} must be a number"));
            };
            if let Some(min) = min.filter(|min| n < *min) {
                return Some(format!("{label} must be at least {}", format_number(min)));
            }
            if let Some(max) = max.filter(|max| n > *max) {
                return Some(format!("{label} must be at most {}", format_number(max)));
            }
            None
        }
        FieldKind::Phone => value
            .as_str()
            .filter(|raw| is_phone(raw))
            .is_none()
            .then(|| format!("{label} must be a valid phone number")),
        FieldKind::Email => value
            .as_str()
            .filter(|raw| is_email(raw))
            .is_none()
            .then(|| format!("{label} must be a valid email address")),
        FieldKind::Date => value
            .as_str()
            .filter(|raw| parse_date(raw).is_some())
            .is_none()
            .then(|| format!("{label} must be a date (YYYY-MM-DD)")),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

fn is_phone(raw: &str) -> bool {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.'));
    let digits = body.chars().filter(char::is_ascii_digit).count();
    allowed && (7..=15).contains(&digits)
}

fn is_email(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}
