//! Server-side HTML for a [`FormSession`].
//!
//! Controls carry `data-sf-event` / `data-sf-upload` attributes that the page
//! runtime turns into [`schemaform_core::FormEvent`] posts and file uploads.
//! Every piece of text coming from descriptors or state is escaped.

use crate::html::{escape_html, field_id, json_attr, value_to_string};
use schemaform_core::descriptor::{FieldDescriptor, FieldKind, GroupItemKind, SelectOption};
use schemaform_core::group;
use schemaform_core::others::{EntryMode, OTHERS_SENTINEL};
use schemaform_core::upload::{Slot, UploadStatus, UploadTarget, UploadTask};
use schemaform_core::{FormSession, ValidationReport};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct FormOptions {
    pub submit_label: String,
    /// Validation messages to show inline, usually from a refused submit.
    pub errors: Option<ValidationReport>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            submit_label: "Submit".to_string(),
            errors: None,
        }
    }
}

pub fn render_form(session: &FormSession, options: &FormOptions) -> String {
    let mut html = String::from("<form class=\"sf-form\" data-sf-form novalidate>\n");
    for field in session.visible() {
        html.push_str(&render_field(session, field, options.errors.as_ref()));
    }

    let pending = session.uploads().pending_count();
    if pending > 0 {
        html.push_str(&format!(
            "<p class=\"sf-notice\" role=\"status\">Waiting for {} upload{} to finish.</p>\n",
            pending,
            if pending == 1 { "" } else { "s" }
        ));
    }
    html.push_str(&format!(
        "<button type=\"submit\" class=\"sf-submit\" data-sf-submit{}>{}</button>\n",
        if pending > 0 { " disabled" } else { "" },
        escape_html(&options.submit_label)
    ));
    html.push_str("</form>\n");
    html
}

fn render_field(session: &FormSession, field: &FieldDescriptor, errors: Option<&ValidationReport>) -> String {
    let id = field_id(&field.path);
    let value = session.value(&field.path);
    let control = match &field.kind {
        FieldKind::Text { placeholder } => {
            let placeholder = placeholder
                .as_deref()
                .map(|p| format!(" placeholder=\"{}\"", escape_html(p)))
                .unwrap_or_default();
            text_input(&id, field, "text", value, &placeholder)
        }
        FieldKind::Email => text_input(&id, field, "email", value, ""),
        FieldKind::Phone => text_input(&id, field, "tel", value, ""),
        FieldKind::Date => text_input(&id, field, "date", value, ""),
        FieldKind::Number { min, max } => {
            let mut extra = String::new();
            if let Some(min) = min {
                extra.push_str(&format!(" min=\"{min}\""));
            }
            if let Some(max) = max {
                extra.push_str(&format!(" max=\"{max}\""));
            }
            text_input(&id, field, "number", value, &extra)
        }
        FieldKind::Textarea { rows } => format!(
            "<textarea id=\"{}\" name=\"{}\" rows=\"{}\" data-sf-event=\"input\">{}</textarea>",
            id,
            escape_html(&field.path),
            rows.unwrap_or(3),
            escape_html(&value.map(value_to_string).unwrap_or_default())
        ),
        FieldKind::Select { options, .. } => {
            if session.entry_mode(&field.path) == EntryMode::FreeText {
                format!(
                    "{}<button type=\"button\" class=\"sf-link\" data-sf-event=\"revert_others\" data-path=\"{}\">Choose from list</button>",
                    text_input(&id, field, "text", value, " placeholder=\"Please specify\""),
                    escape_html(&field.path)
                )
            } else {
                format!(
                    "{}{}",
                    option_search(&id, &field.path),
                    select_control(
                        &id,
                        &field.path,
                        "choose",
                        options,
                        field.kind.offers_others(),
                        value,
                        None
                    )
                )
            }
        }
        FieldKind::MultiSelect { options } => multi_select(&id, &field.path, options, value),
        FieldKind::Checkbox { true_value, .. } => format!(
            "<input type=\"checkbox\" id=\"{}\" name=\"{}\" data-sf-event=\"toggle\"{}>",
            id,
            escape_html(&field.path),
            if value == Some(true_value) { " checked" } else { "" }
        ),
        FieldKind::File { accept, .. } => file_control(session, &id, field, accept.as_deref()),
        FieldKind::FileArray { accept, .. } => file_array(session, &id, field, accept.as_deref()),
        FieldKind::RepeatableGroup { item, add_label } => {
            repeatable_group(session, &id, field, item, add_label.as_deref())
        }
    };

    let error = errors
        .and_then(|report| report.error_for(&field.path))
        .map(|msg| format!("\n  <p class=\"sf-error\" role=\"alert\">{}</p>", escape_html(msg)))
        .unwrap_or_default();
    let required = if field.required {
        "<span class=\"sf-required\" aria-hidden=\"true\">*</span>"
    } else {
        ""
    };

    format!(
        "<div class=\"sf-field sf-kind-{}\" data-path=\"{}\">\n  <label for=\"{}\">{}{}</label>\n  {}{}\n</div>\n",
        field.kind.name(),
        escape_html(&field.path),
        id,
        escape_html(&field.label),
        required,
        control,
        error
    )
}

fn text_input(id: &str, field: &FieldDescriptor, input_type: &str, value: Option<&Value>, extra: &str) -> String {
    format!(
        "<input type=\"{}\" id=\"{}\" name=\"{}\" value=\"{}\" data-sf-event=\"input\"{}{}>",
        input_type,
        id,
        escape_html(&field.path),
        escape_html(&value.map(value_to_string).unwrap_or_default()),
        if field.required { " required" } else { "" },
        extra
    )
}

fn select_control(
    id: &str,
    path: &str,
    event: &str,
    options: &[SelectOption],
    allow_others: bool,
    value: Option<&Value>,
    index: Option<usize>,
) -> String {
    let index_attr = index
        .map(|i| format!(" data-index=\"{i}\""))
        .unwrap_or_default();
    let mut html = format!(
        "<select id=\"{}\" name=\"{}\" data-sf-event=\"{}\"{}>",
        id,
        escape_html(path),
        event,
        index_attr
    );
    let options: Vec<&SelectOption> = options.iter().collect();
    html.push_str(&render_options(&options, value, allow_others));
    html.push_str("</select>");
    html
}

/// The `<option>` list of a single select, also served on its own when the
/// option search narrows a dropdown.
pub fn render_options(options: &[&SelectOption], value: Option<&Value>, allow_others: bool) -> String {
    let nothing_chosen = value.is_none_or(|v| value_to_string(v).is_empty());
    let mut html = format!(
        "<option value=\"&quot;&quot;\"{}>Select...</option>",
        if nothing_chosen { " selected" } else { "" }
    );
    for option in options {
        html.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            json_attr(&option.value),
            if value == Some(&option.value) { " selected" } else { "" },
            escape_html(&option.label)
        ));
    }
    let sentinel = Value::String(OTHERS_SENTINEL.to_string());
    if allow_others && !options.iter().any(|o| o.value == sentinel) {
        html.push_str(&format!(
            "<option value=\"{}\">Others</option>",
            json_attr(&sentinel)
        ));
    }
    html
}

fn option_search(id: &str, path: &str) -> String {
    format!(
        "<input type=\"search\" class=\"sf-option-search\" placeholder=\"Search options\" aria-label=\"Search options\" data-sf-search=\"{}\" data-path=\"{}\">",
        id,
        escape_html(path)
    )
}

fn multi_select(id: &str, path: &str, options: &[SelectOption], value: Option<&Value>) -> String {
    let selected = value.and_then(Value::as_array);
    let mut html = format!("<fieldset id=\"{id}\" class=\"sf-options\">");
    for option in options {
        let checked = selected.is_some_and(|values| values.contains(&option.value));
        html.push_str(&format!(
            "<label class=\"sf-option\"><input type=\"checkbox\" data-sf-event=\"toggle_option\" data-path=\"{}\" data-value=\"{}\"{}> {}</label>",
            escape_html(path),
            json_attr(&option.value),
            if checked { " checked" } else { "" },
            escape_html(&option.label)
        ));
    }
    html.push_str("</fieldset>");
    html
}

fn upload_notice(task: Option<&UploadTask>) -> String {
    match task {
        Some(task) if task.status.is_unresolved() => format!(
            "<span class=\"sf-uploading\" role=\"status\">Uploading {}...</span>",
            escape_html(&task.file_name)
        ),
        Some(UploadTask {
            status: UploadStatus::Failed,
            error: Some(error),
            file_name,
            ..
        }) => format!(
            "<span class=\"sf-upload-error\" role=\"alert\">Could not upload {}: {}. Select the file again to retry.</span>",
            escape_html(file_name),
            escape_html(&error.to_string())
        ),
        _ => String::new(),
    }
}

fn current_file(url: Option<&Value>) -> String {
    match url.and_then(Value::as_str).filter(|u| !u.trim().is_empty()) {
        Some(url) => format!(
            "<a class=\"sf-current-file\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            escape_html(url),
            escape_html(&schemaform_core::media::file_name_from_url(url))
        ),
        None => String::new(),
    }
}

fn file_input(id: &str, path: &str, slot: &str, index: Option<usize>, accept: Option<&str>) -> String {
    format!(
        "<input type=\"file\" id=\"{}\" data-path=\"{}\" data-sf-upload=\"{}\"{}{}>",
        id,
        escape_html(path),
        slot,
        index
            .map(|i| format!(" data-index=\"{i}\""))
            .unwrap_or_default(),
        accept
            .map(|a| format!(" accept=\"{}\"", escape_html(a)))
            .unwrap_or_default()
    )
}

fn file_control(session: &FormSession, id: &str, field: &FieldDescriptor, accept: Option<&str>) -> String {
    let target = UploadTarget::value(field.path.clone());
    format!(
        "{}{}{}",
        current_file(session.value(&field.path)),
        file_input(id, &field.path, "value", None, accept),
        upload_notice(session.uploads().latest_for(&target))
    )
}

fn remove_button(path: &str, index: usize) -> String {
    format!(
        "<button type=\"button\" class=\"sf-remove\" data-sf-event=\"remove_item\" data-path=\"{}\" data-index=\"{}\" aria-label=\"Remove item {}\">Remove</button>",
        escape_html(path),
        index,
        index + 1
    )
}

fn file_array(session: &FormSession, id: &str, field: &FieldDescriptor, accept: Option<&str>) -> String {
    let mut html = String::from("<ul class=\"sf-files\">");
    for (index, url) in group::items(session.state(), &field.path).iter().enumerate() {
        html.push_str(&format!(
            "<li>{}{}</li>",
            current_file(Some(url)),
            remove_button(&field.path, index)
        ));
    }
    html.push_str("</ul>");
    html.push_str(&file_input(id, &field.path, "append", None, accept));
    for task in session
        .uploads()
        .tasks_for_path(&field.path)
        .filter(|task| task.target.slot == Slot::Append)
    {
        html.push_str(&upload_notice(Some(task)));
    }
    html
}

fn repeatable_group(
    session: &FormSession,
    id: &str,
    field: &FieldDescriptor,
    item: &GroupItemKind,
    add_label: Option<&str>,
) -> String {
    let mut html = format!("<ol class=\"sf-group\" id=\"{id}\">");
    for (index, value) in group::items(session.state(), &field.path).iter().enumerate() {
        let item_id = format!("{id}-{index}");
        let control = match item {
            GroupItemKind::Text => format!(
                "<input type=\"text\" id=\"{}\" data-path=\"{}\" data-index=\"{}\" value=\"{}\" data-sf-event=\"set_item\">",
                item_id,
                escape_html(&field.path),
                index,
                escape_html(&value_to_string(value))
            ),
            GroupItemKind::Select { options } => select_control(
                &item_id,
                &field.path,
                "set_item",
                options,
                false,
                Some(value),
                Some(index),
            ),
            GroupItemKind::File { .. } => {
                let target = UploadTarget::item(field.path.clone(), index);
                format!(
                    "{}{}{}",
                    current_file(Some(value)),
                    file_input(&item_id, &field.path, "item", Some(index), None),
                    upload_notice(session.uploads().latest_for(&target))
                )
            }
        };
        html.push_str(&format!(
            "<li class=\"sf-group-item\">{}{}</li>",
            control,
            remove_button(&field.path, index)
        ));
    }
    html.push_str("</ol>");
    html.push_str(&format!(
        "<button type=\"button\" class=\"sf-add\" data-sf-event=\"append_item\" data-path=\"{}\">{}</button>",
        escape_html(&field.path),
        escape_html(add_label.unwrap_or("Add"))
    ));
    html
}
