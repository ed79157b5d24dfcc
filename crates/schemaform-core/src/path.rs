//! Path binding over a nested JSON state tree.
//!
//! Paths use dot notation for object keys and either `[n]` or a bare numeric
//! segment for array positions: `contacts[0].phone`, `contacts.0.phone`.
//! Reads never fail: any missing or mistyped intermediate yields `None`.
//! Writes create whatever containers are missing on the way down.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn key_text(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }
}

/// Split a path into segments. Empty segments (`a..b`, leading dots) are
/// skipped; an unterminated or non-numeric bracket is kept as a literal key.
/// Bare numeric segments stay keys and only act as indices when the
/// container they address is an array.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut out = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        let head_end = rest.find('[').unwrap_or(rest.len());
        let head = &rest[..head_end];
        if !head.is_empty() {
            out.push(PathSegment::Key(head.to_string()));
        }
        rest = &rest[head_end..];
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(close) = stripped.find(']') else {
                out.push(PathSegment::Key(rest.to_string()));
                rest = "";
                break;
            };
            let inner = &stripped[..close];
            match inner.parse::<usize>() {
                Ok(idx) => out.push(PathSegment::Index(idx)),
                Err(_) => out.push(PathSegment::Key(inner.trim_matches(['"', '\'']).to_string())),
            }
            rest = &stripped[close + 1..];
        }
        if !rest.is_empty() {
            out.push(PathSegment::Key(rest.to_string()));
        }
    }
    out
}

fn step<'a>(current: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(obj), seg) => obj.get(&seg.key_text()),
        (Value::Array(arr), PathSegment::Index(i)) => arr.get(*i),
        (Value::Array(arr), PathSegment::Key(k)) => k.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(current: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match (current, segment) {
        (Value::Object(obj), seg) => obj.get_mut(&seg.key_text()),
        (Value::Array(arr), PathSegment::Index(i)) => arr.get_mut(*i),
        (Value::Array(arr), PathSegment::Key(k)) => {
            k.parse::<usize>().ok().and_then(move |i| arr.get_mut(i))
        }
        _ => None,
    }
}

/// Read the value at `path`. The empty path addresses the root.
pub fn get_path<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = state;
    for segment in parse_path(path) {
        current = step(current, &segment)?;
    }
    Some(current)
}

pub fn get_path_mut<'a>(state: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = state;
    for segment in parse_path(path) {
        current = step_mut(current, &segment)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating intermediate containers.
///
/// Key segments materialize objects, index segments materialize arrays
/// padded with `null`. A scalar sitting where a container is needed gets
/// replaced. The empty path replaces the root.
pub fn set_path(state: &mut Value, path: &str, value: Value) {
    let segments = parse_path(path);
    let Some((last, parents)) = segments.split_last() else {
        *state = value;
        return;
    };

    let mut cur = state;
    for (pos, segment) in parents.iter().enumerate() {
        let next = &segments[pos + 1];
        cur = descend_or_create(cur, segment, next);
    }
    write_slot(cur, last, value);
}

fn empty_container_for(next: &PathSegment) -> Value {
    match next {
        PathSegment::Index(_) => Value::Array(Vec::new()),
        PathSegment::Key(_) => Value::Object(Map::new()),
    }
}

// Index a segment addresses in `cur`, coercing `cur` into an array when the
// segment is an explicit `[n]`.
fn array_slot(cur: &mut Value, segment: &PathSegment) -> Option<usize> {
    match segment {
        PathSegment::Index(i) => {
            if !cur.is_array() {
                *cur = Value::Array(Vec::new());
            }
            Some(*i)
        }
        PathSegment::Key(k) if cur.is_array() => k.parse::<usize>().ok(),
        PathSegment::Key(_) => None,
    }
}

fn descend_or_create<'a>(
    cur: &'a mut Value,
    segment: &PathSegment,
    next: &PathSegment,
) -> &'a mut Value {
    let slot = match array_slot(cur, segment) {
        Some(idx) => {
            let arr = cur.as_array_mut().expect("array ensured above");
            if arr.len() <= idx {
                arr.resize(idx + 1, Value::Null);
            }
            &mut arr[idx]
        }
        None => {
            if !cur.is_object() {
                *cur = Value::Object(Map::new());
            }
            cur.as_object_mut()
                .expect("object ensured above")
                .entry(segment.key_text())
                .or_insert_with(|| empty_container_for(next))
        }
    };
    if !is_container(slot) {
        *slot = empty_container_for(next);
    }
    slot
}

fn write_slot(cur: &mut Value, segment: &PathSegment, value: Value) {
    match array_slot(cur, segment) {
        Some(idx) => {
            let arr = cur.as_array_mut().expect("array ensured above");
            if arr.len() <= idx {
                arr.resize(idx + 1, Value::Null);
            }
            arr[idx] = value;
        }
        None => {
            if !cur.is_object() {
                *cur = Value::Object(Map::new());
            }
            cur.as_object_mut()
                .expect("object ensured above")
                .insert(segment.key_text(), value);
        }
    }
}

fn is_container(v: &Value) -> bool {
    v.is_object() || v.is_array()
}

/// Remove and return the value at `path`. Array elements are removed with
/// compaction, so later elements shift down by one.
pub fn remove_path(state: &mut Value, path: &str) -> Option<Value> {
    let segments = parse_path(path);
    let (last, parents) = segments.split_last()?;
    let mut cur = state;
    for segment in parents {
        cur = step_mut(cur, segment)?;
    }
    match (cur, last) {
        (Value::Object(obj), seg) => obj.shift_remove(&seg.key_text()),
        (Value::Array(arr), PathSegment::Index(i)) if *i < arr.len() => Some(arr.remove(*i)),
        (Value::Array(arr), PathSegment::Key(k)) => {
            let i = k.parse::<usize>().ok().filter(|i| *i < arr.len())?;
            Some(arr.remove(i))
        }
        _ => None,
    }
}

/// Path of element `index` inside the array at `path`.
pub fn item_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

/// `true` for values a form treats as "nothing entered".
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_mixed_notation() {
        assert_eq!(
            parse_path("contacts[2].phone"),
            vec![
                PathSegment::Key("contacts".into()),
                PathSegment::Index(2),
                PathSegment::Key("phone".into()),
            ]
        );
        assert_eq!(
            parse_path("a..b"),
            vec![PathSegment::Key("a".into()), PathSegment::Key("b".into())]
        );
        assert!(parse_path("").is_empty());
    }

    #[test]
    fn get_missing_intermediate_is_none() {
        let state = json!({"lead": {"name": "Asha"}});
        assert_eq!(get_path(&state, "lead.name"), Some(&json!("Asha")));
        assert_eq!(get_path(&state, "lead.address.city"), None);
        assert_eq!(get_path(&state, "lead.name.first"), None);
        assert_eq!(get_path(&state, "missing[3]"), None);
    }

    #[test]
    fn get_reads_array_by_bracket_and_dot() {
        let state = json!({"docs": ["a.pdf", "b.pdf"]});
        assert_eq!(get_path(&state, "docs[1]"), Some(&json!("b.pdf")));
        assert_eq!(get_path(&state, "docs.0"), Some(&json!("a.pdf")));
        assert_eq!(get_path(&state, "docs[5]"), None);
    }

    #[test]
    fn set_creates_intermediates() {
        let mut state = json!({});
        set_path(&mut state, "lead.address.city", json!("Pune"));
        assert_eq!(state, json!({"lead": {"address": {"city": "Pune"}}}));
    }

    #[test]
    fn set_trailing_index_pads_array() {
        let mut state = json!({});
        set_path(&mut state, "files[2]", json!("https://cdn/x.png"));
        assert_eq!(state, json!({"files": [null, null, "https://cdn/x.png"]}));

        set_path(&mut state, "files[0]", json!("https://cdn/a.png"));
        assert_eq!(get_path(&state, "files[0]"), Some(&json!("https://cdn/a.png")));
        assert_eq!(state["files"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut state = json!({"lead": "flat"});
        set_path(&mut state, "lead.name", json!("Ravi"));
        assert_eq!(state, json!({"lead": {"name": "Ravi"}}));
    }

    #[test]
    fn set_nested_inside_array_element() {
        let mut state = json!({"contacts": [{"name": "A"}]});
        set_path(&mut state, "contacts[0].phone", json!("+91 99"));
        set_path(&mut state, "contacts[1].name", json!("B"));
        assert_eq!(
            state,
            json!({"contacts": [{"name": "A", "phone": "+91 99"}, {"name": "B"}]})
        );
    }

    #[test]
    fn round_trip_holds_across_path_shapes() {
        let paths = [
            "name",
            "a.b.c",
            "list[0]",
            "list[3].inner",
            "deep.arr[1][2]",
            "x.0.y",
        ];
        let values = [json!("text"), json!(42), json!(null), json!({"k": [1, 2]}), json!(true)];
        for path in paths {
            for value in &values {
                let mut state = json!({"name": "seed", "list": ["keep"]});
                set_path(&mut state, path, value.clone());
                assert_eq!(get_path(&state, path), Some(value), "path {path}");
            }
        }
    }

    #[test]
    fn remove_compacts_arrays() {
        let mut state = json!({"items": ["a", "b", "c"]});
        assert_eq!(remove_path(&mut state, "items[1]"), Some(json!("b")));
        assert_eq!(state, json!({"items": ["a", "c"]}));
        assert_eq!(remove_path(&mut state, "items[9]"), None);
        assert_eq!(remove_path(&mut state, "nope.x"), None);
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!("  "))));
        assert!(is_blank(Some(&json!([]))));
        assert!(!is_blank(Some(&json!(0))));
        assert!(!is_blank(Some(&json!(false))));
    }
}
