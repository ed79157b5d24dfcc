//! schemaform core crate.
//!
//! Headless engine for schema-driven forms and read-only detail views. The
//! layers build on each other leaf-first:
//!
//! - `path`: get/set/remove on a `serde_json::Value` tree by dot/bracket path.
//! - `descriptor` + `resolver`: field vocabulary and conditional visibility.
//! - `others`, `group`, `upload`: the per-field sub-controllers (OTHERS
//!   free-text fallback, repeatable groups, file uploads).
//! - `session`: one running form that owns its state and routes events.
//! - `view`: display resolution for records that are never edited.
//!
//! Rendering to HTML and HTTP transport live in `schemaform-web`.

pub mod descriptor;
pub mod error;
pub mod group;
pub mod media;
pub mod others;
pub mod path;
pub mod resolver;
pub mod schema;
pub mod search;
pub mod session;
pub mod upload;
pub mod validate;
pub mod view;

pub use descriptor::{
    DependencyMode, DependencyRule, FieldDescriptor, FieldKind, GroupItemKind, SelectOption,
    Visibility,
};
pub use error::{FormError, SchemaError, SubmitError, UploadError};
pub use others::{EntryMode, OTHERS_SENTINEL, OthersModeRegistry, Transition};
pub use path::{get_path, set_path};
pub use resolver::visible_fields;
pub use schema::FormSchema;
pub use session::{FormEvent, FormSession};
pub use upload::{
    Completion, FileSelection, SignRequest, SignedUpload, Slot, TaskId, UploadBackend,
    UploadOrchestrator, UploadOutcome, UploadStatus, UploadTarget, UploadTicket, perform_upload,
};
pub use validate::ValidationReport;
pub use view::{DisplayValue, ViewDescriptor, ViewEntry, ViewKind, resolve_view};
