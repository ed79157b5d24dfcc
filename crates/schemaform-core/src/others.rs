//! Dropdown / free-text fallback for enumerated fields.
//!
//! Picking the `OTHERS` sentinel swaps a select for a free-text input and
//! clears the stored value; the sentinel itself is never left in state.

use crate::path::{get_path, set_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const OTHERS_SENTINEL: &str = "OTHERS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryMode {
    #[default]
    Dropdown,
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    EnteredFreeText,
    ReturnedToDropdown,
}

pub fn is_sentinel(value: &Value) -> bool {
    value.as_str() == Some(OTHERS_SENTINEL)
}

/// Per-form map of enumerated field path to its entry mode.
#[derive(Debug, Clone, Default)]
pub struct OthersModeRegistry {
    modes: BTreeMap<String, EntryMode>,
}

impl OthersModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, path: &str) -> EntryMode {
        self.modes.get(path).copied().unwrap_or_default()
    }

    /// Apply a user pick from the dropdown.
    pub fn choose(&mut self, state: &mut Value, path: &str, value: Value) -> Transition {
        if is_sentinel(&value) {
            return self.enter_free_text(state, path);
        }
        set_path(state, path, value);
        Transition::Unchanged
    }

    /// Re-check the stored value, e.g. after initial data was loaded or a
    /// write bypassed `choose`.
    pub fn sync(&mut self, state: &mut Value, path: &str) -> Transition {
        match get_path(state, path) {
            Some(stored) if is_sentinel(stored) => self.enter_free_text(state, path),
            _ => Transition::Unchanged,
        }
    }

    fn enter_free_text(&mut self, state: &mut Value, path: &str) -> Transition {
        if self.mode(path) == EntryMode::FreeText {
            // Already free text: only scrub a sentinel that slipped in.
            if get_path(state, path).is_some_and(is_sentinel) {
                set_path(state, path, Value::String(String::new()));
            }
            return Transition::Unchanged;
        }
        self.modes.insert(path.to_string(), EntryMode::FreeText);
        set_path(state, path, Value::String(String::new()));
        debug!(path, "enumerated field switched to free text");
        Transition::EnteredFreeText
    }

    /// Explicit revert from free text back to the option list.
    pub fn revert(&mut self, state: &mut Value, path: &str) -> Transition {
        if self.mode(path) != EntryMode::FreeText {
            return Transition::Unchanged;
        }
        self.modes.remove(path);
        set_path(state, path, Value::String(String::new()));
        debug!(path, "enumerated field reverted to dropdown");
        Transition::ReturnedToDropdown
    }
}
