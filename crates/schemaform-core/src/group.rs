//! Repeatable groups: an ordered list of items stored at one path.

use crate::descriptor::GroupItemKind;
use crate::error::FormError;
use crate::path::{get_path, get_path_mut, item_path, set_path};
use serde_json::Value;

pub fn items<'a>(state: &'a Value, path: &str) -> &'a [Value] {
    get_path(state, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn len(state: &Value, path: &str) -> usize {
    items(state, path).len()
}

/// Append an empty item and return its index. A missing or non-array value
/// at `path` is replaced by a fresh list.
pub fn append(state: &mut Value, path: &str, item: &GroupItemKind) -> usize {
    push(state, path, item.empty_value())
}

pub fn push(state: &mut Value, path: &str, value: Value) -> usize {
    match get_path_mut(state, path) {
        Some(Value::Array(arr)) => {
            arr.push(value);
            arr.len() - 1
        }
        _ => {
            set_path(state, path, Value::Array(vec![value]));
            0
        }
    }
}

/// Remove item `index`, shifting every later item down by one.
pub fn remove(state: &mut Value, path: &str, index: usize) -> Result<Value, FormError> {
    match get_path_mut(state, path) {
        Some(Value::Array(arr)) if index < arr.len() => Ok(arr.remove(index)),
        Some(Value::Array(arr)) => Err(FormError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len: arr.len(),
        }),
        _ => Err(FormError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len: 0,
        }),
    }
}

pub fn set_item(state: &mut Value, path: &str, index: usize, value: Value) -> Result<(), FormError> {
    let current = len(state, path);
    if index >= current {
        return Err(FormError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len: current,
        });
    }
    set_path(state, &item_path(path, index), value);
    Ok(())
}
