//! One running form.
//!
//! A [`FormSession`] exclusively owns its state tree, its OTHERS registry and
//! its upload tasks. Every mutation goes through `&mut self`, so events are
//! applied strictly in the order they arrive; the only suspension points are
//! the upload futures, which run detached from the session.

use crate::descriptor::{FieldDescriptor, FieldKind, GroupItemKind, SelectOption};
use crate::error::{FormError, SubmitError};
use crate::group;
use crate::others::{EntryMode, OthersModeRegistry, Transition};
use crate::path::{get_path, set_path};
use crate::resolver::visible_fields;
use crate::schema::FormSchema;
use crate::search::filter_options;
use crate::upload::{
    Completion, FileSelection, Slot, TaskId, UploadBackend, UploadOrchestrator, UploadOutcome,
    UploadTarget, UploadTicket, perform_upload,
};
use crate::validate::{ValidationReport, validate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// A user interaction, as delivered by whatever front end drives the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum FormEvent {
    Input { path: String, value: Value },
    Choose { path: String, value: Value },
    RevertOthers { path: String },
    Toggle { path: String, checked: bool },
    ToggleOption { path: String, value: Value, selected: bool },
    AppendItem { path: String },
    RemoveItem { path: String, index: usize },
    SetItem { path: String, index: usize, value: Value },
}

#[derive(Debug)]
pub struct FormSession {
    descriptors: Vec<FieldDescriptor>,
    state: Value,
    others: OthersModeRegistry,
    uploads: UploadOrchestrator,
}

impl FormSession {
    pub fn new(descriptors: Vec<FieldDescriptor>, initial_data: Option<Value>) -> Self {
        let state = match initial_data {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(data) => data,
        };
        let mut session = Self {
            descriptors,
            state,
            others: OthersModeRegistry::new(),
            uploads: UploadOrchestrator::new(),
        };
        session.sync_others();
        session
    }

    pub fn from_schema(schema: &FormSchema) -> Self {
        Self::new(schema.fields.clone(), schema.initial_data.clone())
    }

    // Seeded data may already hold the sentinel.
    fn sync_others(&mut self) {
        for field in &self.descriptors {
            if field.kind.offers_others() {
                self.others.sync(&mut self.state, &field.path);
            }
        }
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn into_state(self) -> Value {
        self.state
    }

    pub fn value(&self, path: &str) -> Option<&Value> {
        get_path(&self.state, path)
    }

    pub fn visible(&self) -> Vec<&FieldDescriptor> {
        visible_fields(&self.descriptors, &self.state)
    }

    pub fn field(&self, path: &str) -> Result<&FieldDescriptor, FormError> {
        self.descriptors
            .iter()
            .find(|field| field.path == path)
            .ok_or_else(|| FormError::UnknownField(path.to_string()))
    }

    /// Options of the enumerated field at `path` whose labels match `query`.
    pub fn search_options(&self, path: &str, query: &str) -> Result<Vec<&SelectOption>, FormError> {
        let kind = &self.field(path)?.kind;
        let options = kind.options();
        if options.is_empty() {
            return Err(FormError::WrongKind {
                path: path.to_string(),
                kind: kind.name(),
                operation: "option search",
            });
        }
        Ok(filter_options(options, query))
    }

    pub fn entry_mode(&self, path: &str) -> EntryMode {
        self.others.mode(path)
    }

    pub fn uploads(&self) -> &UploadOrchestrator {
        &self.uploads
    }

    pub fn validate(&self) -> ValidationReport {
        validate(&self.descriptors, &self.state)
    }

    pub fn apply(&mut self, event: FormEvent) -> Result<(), FormError> {
        debug!(?event, "applying form event");
        match event {
            FormEvent::Input { path, value } => self.input(&path, value),
            FormEvent::Choose { path, value } => self.choose(&path, value).map(|_| ()),
            FormEvent::RevertOthers { path } => self.revert_others(&path).map(|_| ()),
            FormEvent::Toggle { path, checked } => self.toggle(&path, checked),
            FormEvent::ToggleOption {
                path,
                value,
                selected,
            } => self.toggle_option(&path, value, selected),
            FormEvent::AppendItem { path } => self.append_item(&path).map(|_| ()),
            FormEvent::RemoveItem { path, index } => self.remove_item(&path, index).map(|_| ()),
            FormEvent::SetItem { path, index, value } => self.set_item(&path, index, value),
        }
    }

    /// Typed input for scalar fields, free-text OTHERS entry, whole
    /// multi-select arrays, and clearing a file field.
    pub fn input(&mut self, path: &str, value: Value) -> Result<(), FormError> {
        let field = self.field(path)?;
        match &field.kind {
            FieldKind::Text { .. }
            | FieldKind::Email
            | FieldKind::Phone
            | FieldKind::Number { .. }
            | FieldKind::Textarea { .. }
            | FieldKind::Date => {
                set_path(&mut self.state, path, value);
                Ok(())
            }
            FieldKind::Select { .. } if self.others.mode(path) == EntryMode::FreeText => {
                set_path(&mut self.state, path, value);
                Ok(())
            }
            FieldKind::Select { .. } => self.choose(path, value).map(|_| ()),
            FieldKind::MultiSelect { .. } if value.is_array() || value.is_null() => {
                set_path(&mut self.state, path, value);
                Ok(())
            }
            FieldKind::File { .. } | FieldKind::FileArray { .. }
                if value.is_null() || value.as_str() == Some("") =>
            {
                let cleared = if matches!(field.kind, FieldKind::FileArray { .. }) {
                    Value::Array(Vec::new())
                } else {
                    Value::String(String::new())
                };
                set_path(&mut self.state, path, cleared);
                Ok(())
            }
            other => Err(FormError::WrongKind {
                path: path.to_string(),
                kind: other.name(),
                operation: "typed input",
            }),
        }
    }

    /// Pick an option of a select field.
    pub fn choose(&mut self, path: &str, value: Value) -> Result<Transition, FormError> {
        let field = self.field(path)?;
        match &field.kind {
            kind if kind.offers_others() => Ok(self.others.choose(&mut self.state, path, value)),
            FieldKind::Select { .. } => {
                set_path(&mut self.state, path, value);
                Ok(Transition::Unchanged)
            }
            other => Err(FormError::WrongKind {
                path: path.to_string(),
                kind: other.name(),
                operation: "option choice",
            }),
        }
    }

    pub fn revert_others(&mut self, path: &str) -> Result<Transition, FormError> {
        self.field(path)?;
        Ok(self.others.revert(&mut self.state, path))
    }

    pub fn toggle(&mut self, path: &str, checked: bool) -> Result<(), FormError> {
        let field = self.field(path)?;
        let FieldKind::Checkbox {
            true_value,
            false_value,
        } = &field.kind
        else {
            return Err(FormError::WrongKind {
                path: path.to_string(),
                kind: field.kind.name(),
                operation: "toggle",
            });
        };
        let value = if checked {
            true_value.clone()
        } else {
            false_value.clone()
        };
        set_path(&mut self.state, path, value);
        Ok(())
    }

    /// Add or remove one value of a multi-select, keeping selection order.
    pub fn toggle_option(&mut self, path: &str, value: Value, selected: bool) -> Result<(), FormError> {
        let field = self.field(path)?;
        if !matches!(field.kind, FieldKind::MultiSelect { .. }) {
            return Err(FormError::WrongKind {
                path: path.to_string(),
                kind: field.kind.name(),
                operation: "option toggle",
            });
        }
        let mut current = group::items(&self.state, path).to_vec();
        let present = current.contains(&value);
        if selected && !present {
            current.push(value);
        } else if !selected && present {
            current.retain(|existing| existing != &value);
        }
        set_path(&mut self.state, path, Value::Array(current));
        Ok(())
    }

    fn group_item_kind(&self, path: &str) -> Result<&GroupItemKind, FormError> {
        let field = self.field(path)?;
        match &field.kind {
            FieldKind::RepeatableGroup { item, .. } => Ok(item),
            other => Err(FormError::WrongKind {
                path: path.to_string(),
                kind: other.name(),
                operation: "group items",
            }),
        }
    }

    pub fn append_item(&mut self, path: &str) -> Result<usize, FormError> {
        let item = self.group_item_kind(path)?.clone();
        let index = group::append(&mut self.state, path, &item);
        debug!(path, index, "group item appended");
        Ok(index)
    }

    /// Remove one item of a repeatable group or file array. Uploads bound
    /// to later items follow them to their new index.
    pub fn remove_item(&mut self, path: &str, index: usize) -> Result<Value, FormError> {
        let field = self.field(path)?;
        if !matches!(
            field.kind,
            FieldKind::RepeatableGroup { .. } | FieldKind::FileArray { .. }
        ) {
            return Err(FormError::WrongKind {
                path: path.to_string(),
                kind: field.kind.name(),
                operation: "item removal",
            });
        }
        let removed = group::remove(&mut self.state, path, index)?;
        self.uploads.on_item_removed(path, index);
        debug!(path, index, "group item removed");
        Ok(removed)
    }

    pub fn set_item(&mut self, path: &str, index: usize, value: Value) -> Result<(), FormError> {
        if matches!(self.group_item_kind(path)?, GroupItemKind::File { .. }) {
            return Err(FormError::WrongKind {
                path: path.to_string(),
                kind: "repeatable_group",
                operation: "direct values for file items",
            });
        }
        group::set_item(&mut self.state, path, index, value)
    }

    /// Register a file selection for `target`. The returned task still has
    /// to be dispatched.
    pub fn select_file(&mut self, target: UploadTarget, file: FileSelection) -> Result<TaskId, FormError> {
        let field = self.field(&target.owner_path)?;
        let folder_hint = match (&field.kind, &target.slot) {
            (FieldKind::File { folder_hint, .. }, Slot::Value) => folder_hint.clone(),
            (FieldKind::FileArray { folder_hint, .. }, Slot::Append) => folder_hint.clone(),
            (FieldKind::FileArray { folder_hint, .. }, Slot::Item(index))
                if *index < group::len(&self.state, &target.owner_path) =>
            {
                folder_hint.clone()
            }
            (
                FieldKind::RepeatableGroup {
                    item: GroupItemKind::File { folder_hint },
                    ..
                },
                Slot::Item(index),
            ) => {
                let len = group::len(&self.state, &target.owner_path);
                if *index >= len {
                    return Err(FormError::IndexOutOfRange {
                        path: target.owner_path.clone(),
                        index: *index,
                        len,
                    });
                }
                folder_hint.clone()
            }
            (other, _) => {
                return Err(FormError::WrongKind {
                    path: target.owner_path.clone(),
                    kind: other.name(),
                    operation: "this file upload slot",
                });
            }
        };
        Ok(self.uploads.begin(target, file, folder_hint.as_deref()))
    }

    pub fn dispatch_upload(&mut self, id: TaskId) -> Result<UploadTicket, FormError> {
        self.uploads.dispatch(id)
    }

    pub fn complete_upload(&mut self, outcome: UploadOutcome) -> Completion {
        self.uploads.complete(&mut self.state, outcome)
    }

    /// Select, upload and apply in one go. Other uploads of this session may
    /// still be in flight elsewhere; this one is awaited to completion.
    pub async fn upload<B: UploadBackend>(
        &mut self,
        backend: &B,
        target: UploadTarget,
        file: FileSelection,
    ) -> Result<Completion, FormError> {
        let id = self.select_file(target, file)?;
        let ticket = self.dispatch_upload(id)?;
        let outcome = perform_upload(backend, ticket).await;
        Ok(self.complete_upload(outcome))
    }

    pub fn uploads_in_flight(&self) -> bool {
        self.uploads.is_busy()
    }

    /// Drop every upload; results that arrive later are ignored.
    pub fn abandon_uploads(&mut self) {
        self.uploads.abandon_all();
    }

    /// Hand the resolved state to `on_submit`. Refused while uploads are
    /// unresolved or any visible field is invalid; the session itself never
    /// talks to a backend.
    pub fn submit<F, R>(&self, on_submit: F) -> Result<R, SubmitError>
    where
        F: FnOnce(&Value) -> R,
    {
        let pending = self.uploads.pending_count();
        if pending > 0 {
            return Err(SubmitError::UploadsPending { pending });
        }
        let report = self.validate();
        if !report.is_valid() {
            return Err(SubmitError::Invalid(report));
        }
        info!(fields = self.descriptors.len(), "form submitted");
        Ok(on_submit(&self.state))
    }
}
