//! Upload orchestration.
//!
//! A file selection becomes an [`UploadTask`]. Dispatching the task yields an
//! owned [`UploadTicket`] that [`perform_upload`] turns into an
//! [`UploadOutcome`] without touching form state, so any number of tickets
//! can be awaited concurrently. Outcomes are then applied one at a time with
//! [`UploadOrchestrator::complete`], which drops results for selections that
//! were superseded, removed, or abandoned in the meantime.

use crate::error::{FormError, UploadError};
use crate::group;
use crate::media::{FileClass, slug};
use crate::path::{PathSegment, item_path, parse_path, set_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use tracing::{debug, warn};

pub type TaskId = u64;

/// Where a finished upload writes its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "slot", content = "index")]
pub enum Slot {
    /// The leaf at the owner path itself.
    Value,
    /// Element `n` of the array at the owner path.
    Item(usize),
    /// A new element pushed onto the array at the owner path.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub owner_path: String,
    #[serde(flatten)]
    pub slot: Slot,
}

impl UploadTarget {
    pub fn value(owner_path: impl Into<String>) -> Self {
        Self {
            owner_path: owner_path.into(),
            slot: Slot::Value,
        }
    }

    pub fn item(owner_path: impl Into<String>, index: usize) -> Self {
        Self {
            owner_path: owner_path.into(),
            slot: Slot::Item(index),
        }
    }

    pub fn append(owner_path: impl Into<String>) -> Self {
        Self {
            owner_path: owner_path.into(),
            slot: Slot::Append,
        }
    }

    /// Appends never compete with each other; every other slot is owned by
    /// its latest selection.
    fn is_exclusive(&self) -> bool {
        self.slot != Slot::Append
    }
}

/// A local file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub file_name: String,
    pub file_type: String,
    pub bytes: Vec<u8>,
}

impl FileSelection {
    pub fn new(file_name: impl Into<String>, file_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: file_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl UploadStatus {
    pub fn is_unresolved(self) -> bool {
        matches!(self, UploadStatus::Pending | UploadStatus::InFlight)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub id: TaskId,
    pub target: UploadTarget,
    pub generation: u64,
    pub file_name: String,
    pub folder_name: String,
    pub status: UploadStatus,
    pub result_url: Option<String>,
    pub error: Option<UploadError>,
}

/// Body sent to the signing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub file_name: String,
    pub file_type: String,
    pub folder_name: String,
}

/// Signing response: where to send the bytes, and the durable URL to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUpload {
    #[serde(rename = "uploadURL", alias = "uploadUrl")]
    pub upload_url: String,
    #[serde(rename = "fileURL", alias = "fileUrl")]
    pub file_url: String,
}

/// Transport for the two network legs of an upload.
pub trait UploadBackend {
    fn sign(
        &self,
        request: &SignRequest,
    ) -> impl Future<Output = Result<SignedUpload, UploadError>> + Send;

    fn transfer(
        &self,
        signed: &SignedUpload,
        file: &FileSelection,
    ) -> impl Future<Output = Result<(), UploadError>> + Send;
}

/// Everything one upload needs, detached from the form.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub task_id: TaskId,
    pub generation: u64,
    pub request: SignRequest,
    pub file: FileSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub task_id: TaskId,
    pub generation: u64,
    pub result: Result<String, UploadError>,
}

/// Sign, then transfer. Never touches form state.
pub async fn perform_upload<B: UploadBackend>(backend: &B, ticket: UploadTicket) -> UploadOutcome {
    let result: Result<String, UploadError> = async {
        if ticket.file.bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        let signed = backend.sign(&ticket.request).await?;
        backend.transfer(&signed, &ticket.file).await?;
        Ok(signed.file_url)
    }
    .await;
    UploadOutcome {
        task_id: ticket.task_id,
        generation: ticket.generation,
        result,
    }
}

/// What applying an outcome did.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The URL was written. The task is retired from the orchestrator and
    /// handed back with its final status.
    Applied(UploadTask),
    Failed { target: UploadTarget, error: UploadError },
    /// The selection was superseded, its group item removed, or the form
    /// abandoned. State is untouched.
    Discarded,
}

/// Folder used when a field does not name one: the last named segment of
/// the owner path, or a category derived from the file extension.
pub fn derive_folder(owner_path: &str, file_name: &str) -> String {
    parse_path(owner_path)
        .iter()
        .rev()
        .find_map(|segment| match segment {
            PathSegment::Key(key) if key.parse::<usize>().is_err() => Some(slug(key)),
            _ => None,
        })
        .filter(|folder| !folder.is_empty())
        .unwrap_or_else(|| FileClass::classify(file_name).folder().to_string())
}

#[derive(Debug, Default)]
pub struct UploadOrchestrator {
    tasks: BTreeMap<TaskId, UploadTask>,
    files: HashMap<TaskId, FileSelection>,
    latest: HashMap<UploadTarget, u64>,
    next_id: TaskId,
    next_generation: u64,
}

impl UploadOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new selection. Any earlier task for the same slot is
    /// superseded and its eventual outcome will be discarded.
    pub fn begin(
        &mut self,
        target: UploadTarget,
        file: FileSelection,
        folder_hint: Option<&str>,
    ) -> TaskId {
        self.next_id += 1;
        self.next_generation += 1;
        let id = self.next_id;
        let generation = self.next_generation;

        if target.is_exclusive() {
            let superseded: Vec<TaskId> = self
                .tasks
                .values()
                .filter(|task| task.target == target)
                .map(|task| task.id)
                .collect();
            for old in superseded {
                self.tasks.remove(&old);
                self.files.remove(&old);
                debug!(task = old, "upload superseded by a newer selection");
            }
            self.latest.insert(target.clone(), generation);
        }

        let folder_name = folder_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| derive_folder(&target.owner_path, &file.file_name));

        debug!(
            task = id,
            path = %target.owner_path,
            file = %file.file_name,
            folder = %folder_name,
            "upload registered"
        );
        self.tasks.insert(
            id,
            UploadTask {
                id,
                target,
                generation,
                file_name: file.file_name.clone(),
                folder_name,
                status: UploadStatus::Pending,
                result_url: None,
                error: None,
            },
        );
        self.files.insert(id, file);
        id
    }

    /// Move a pending task in flight and hand out its ticket.
    pub fn dispatch(&mut self, id: TaskId) -> Result<UploadTicket, FormError> {
        let task = self
            .tasks
            .get_mut(&id)
            .filter(|task| task.status == UploadStatus::Pending)
            .ok_or(FormError::UnknownUpload(id))?;
        let file = self.files.remove(&id).ok_or(FormError::UnknownUpload(id))?;
        task.status = UploadStatus::InFlight;
        Ok(UploadTicket {
            task_id: id,
            generation: task.generation,
            request: SignRequest {
                file_name: file.file_name.clone(),
                file_type: file.file_type.clone(),
                folder_name: task.folder_name.clone(),
            },
            file,
        })
    }

    /// Apply a finished upload to `state`.
    pub fn complete(&mut self, state: &mut Value, outcome: UploadOutcome) -> Completion {
        let Some(task) = self.tasks.get_mut(&outcome.task_id) else {
            warn!(task = outcome.task_id, "discarding outcome of a dropped upload");
            return Completion::Discarded;
        };
        let current = task.generation == outcome.generation
            && (!task.target.is_exclusive()
                || self.latest.get(&task.target) == Some(&outcome.generation));
        if !current {
            warn!(task = outcome.task_id, "discarding stale upload outcome");
            self.tasks.remove(&outcome.task_id);
            return Completion::Discarded;
        }

        match outcome.result {
            Ok(url) => {
                let target = task.target.clone();
                match &target.slot {
                    Slot::Value => set_path(state, &target.owner_path, Value::String(url.clone())),
                    Slot::Item(index) => {
                        if *index >= group::len(state, &target.owner_path) {
                            warn!(task = task.id, index, "group item vanished before upload finished");
                            self.tasks.remove(&outcome.task_id);
                            return Completion::Discarded;
                        }
                        set_path(
                            state,
                            &item_path(&target.owner_path, *index),
                            Value::String(url.clone()),
                        );
                    }
                    Slot::Append => {
                        group::push(state, &target.owner_path, Value::String(url.clone()));
                    }
                }
                debug!(task = outcome.task_id, path = %target.owner_path, "upload applied");
                let Some(mut task) = self.retire(outcome.task_id) else {
                    return Completion::Discarded;
                };
                task.status = UploadStatus::Succeeded;
                task.result_url = Some(url);
                task.error = None;
                Completion::Applied(task)
            }
            Err(error) => {
                warn!(task = task.id, path = %task.target.owner_path, %error, "upload failed");
                task.status = UploadStatus::Failed;
                task.error = Some(error.clone());
                Completion::Failed {
                    target: task.target.clone(),
                    error,
                }
            }
        }
    }

    /// Drop a finished task. Appending into a file list also clears the
    /// failures left by earlier attempts on that list.
    fn retire(&mut self, id: TaskId) -> Option<UploadTask> {
        let task = self.tasks.remove(&id)?;
        self.files.remove(&id);
        if task.target.is_exclusive() {
            if self.latest.get(&task.target) == Some(&task.generation) {
                self.latest.remove(&task.target);
            }
        } else {
            let failed: Vec<TaskId> = self
                .tasks
                .values()
                .filter(|other| {
                    other.target == task.target && other.status == UploadStatus::Failed
                })
                .map(|other| other.id)
                .collect();
            for old in failed {
                self.tasks.remove(&old);
                debug!(task = old, "failed upload cleared by a later success");
            }
        }
        Some(task)
    }

    /// Keep task addresses in step with a group whose item `removed` was
    /// deleted: tasks on that item are dropped, later ones shift down.
    pub fn on_item_removed(&mut self, owner_path: &str, removed: usize) {
        let mut dropped = Vec::new();
        for task in self.tasks.values_mut() {
            if task.target.owner_path != owner_path {
                continue;
            }
            if let Slot::Item(index) = task.target.slot {
                if index == removed {
                    dropped.push(task.id);
                } else if index > removed {
                    task.target.slot = Slot::Item(index - 1);
                }
            }
        }
        for id in dropped {
            self.tasks.remove(&id);
            self.files.remove(&id);
            debug!(task = id, "upload dropped with its group item");
        }

        self.latest = std::mem::take(&mut self.latest)
            .into_iter()
            .filter_map(|(mut target, generation)| {
                if target.owner_path == owner_path {
                    if let Slot::Item(index) = target.slot {
                        if index == removed {
                            return None;
                        }
                        if index > removed {
                            target.slot = Slot::Item(index - 1);
                        }
                    }
                }
                Some((target, generation))
            })
            .collect();
    }

    /// Forget every task, e.g. when the form goes away. Late outcomes are
    /// discarded.
    pub fn abandon_all(&mut self) {
        if !self.tasks.is_empty() {
            debug!(count = self.tasks.len(), "abandoning uploads");
        }
        self.tasks.clear();
        self.files.clear();
        self.latest.clear();
    }

    pub fn is_busy(&self) -> bool {
        self.pending_count() > 0
    }

    pub fn pending_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| task.status.is_unresolved())
            .count()
    }

    pub fn task(&self, id: TaskId) -> Option<&UploadTask> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &UploadTask> {
        self.tasks.values()
    }

    /// Most recent task addressed to `target`.
    pub fn latest_for(&self, target: &UploadTarget) -> Option<&UploadTask> {
        self.tasks.values().rev().find(|task| &task.target == target)
    }

    /// Tasks writing anywhere under `owner_path`.
    pub fn tasks_for_path<'a>(&'a self, owner_path: &'a str) -> impl Iterator<Item = &'a UploadTask> {
        self.tasks
            .values()
            .filter(move |task| task.target.owner_path == owner_path)
    }

    pub fn error_for(&self, target: &UploadTarget) -> Option<&UploadError> {
        self.latest_for(target).and_then(|task| task.error.as_ref())
    }
}
