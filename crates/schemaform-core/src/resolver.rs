//! Conditional visibility.
//!
//! Visibility is always computed from the live state passed in, so a chain
//! of dependencies (C on B on A) settles in a single pass over the list.

use crate::descriptor::{DependencyMode, DependencyRule, FieldDescriptor, Visibility};
use crate::path::get_path;
use serde_json::Value;

pub fn rule_holds(rule: &DependencyRule, state: &Value) -> bool {
    let actual = get_path(state, &rule.target_path);
    match &rule.mode {
        DependencyMode::EqualsOneOf { allowed } => {
            actual.is_some_and(|value| allowed.iter().any(|candidate| candidate == value))
        }
        DependencyMode::NotEquals { excluded } => actual != Some(excluded),
    }
}

pub fn is_visible(visibility: Option<&Visibility>, state: &Value) -> bool {
    visibility.is_none_or(|v| v.rules().iter().all(|rule| rule_holds(rule, state)))
}

/// Visible descriptors in declaration order, with file-backed fields moved
/// after every other field.
pub fn visible_fields<'a>(
    descriptors: &'a [FieldDescriptor],
    state: &Value,
) -> Vec<&'a FieldDescriptor> {
    let (files, mut rest): (Vec<_>, Vec<_>) = descriptors
        .iter()
        .filter(|field| is_visible(field.visibility.as_ref(), state))
        .partition(|field| field.is_file_backed());
    rest.extend(files);
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldKind;
    use serde_json::json;

    fn fixture() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::text("Country", "country"),
            FieldDescriptor::text("State", "state").visible_when(DependencyRule::equals_one_of(
                "country",
                vec![json!("INDIA")],
            )),
            FieldDescriptor::text("State (other)", "stateOther")
                .visible_when(DependencyRule::not_equals("country", "INDIA")),
        ]
    }

    fn paths(fields: &[&FieldDescriptor]) -> Vec<String> {
        fields.iter().map(|f| f.path.clone()).collect()
    }

    #[test]
    fn country_fixture_scenario() {
        let fields = fixture();
        let india = json!({"country": "INDIA"});
        assert_eq!(paths(&visible_fields(&fields, &india)), ["country", "state"]);

        let usa = json!({"country": "USA"});
        assert_eq!(paths(&visible_fields(&fields, &usa)), ["country", "stateOther"]);
    }

    #[test]
    fn missing_target_hides_equals_and_shows_not_equals() {
        let fields = fixture();
        let empty = json!({});
        assert_eq!(paths(&visible_fields(&fields, &empty)), ["country", "stateOther"]);
    }

    #[test]
    fn resolving_twice_is_deterministic() {
        let fields = fixture();
        let state = json!({"country": "USA"});
        let first = paths(&visible_fields(&fields, &state));
        let second = paths(&visible_fields(&fields, &state));
        assert_eq!(first, second);
    }

    #[test]
    fn transitive_chain_follows_current_state() {
        let fields = vec![
            FieldDescriptor::text("A", "a"),
            FieldDescriptor::text("B", "b")
                .visible_when(DependencyRule::equals_one_of("a", vec![json!("yes")])),
            FieldDescriptor::text("C", "c")
                .visible_when(DependencyRule::equals_one_of("b", vec![json!("go")])),
        ];
        let state = json!({"a": "yes", "b": "go"});
        assert_eq!(paths(&visible_fields(&fields, &state)), ["a", "b", "c"]);

        let state = json!({"a": "no", "b": "go"});
        // B is hidden but keeps its value, so C still reads it.
        assert_eq!(paths(&visible_fields(&fields, &state)), ["a", "c"]);
    }

    #[test]
    fn allowed_set_and_strict_equality() {
        let rule = DependencyRule::equals_one_of("stage", vec![json!("NEW"), json!("WARM")]);
        assert!(rule_holds(&rule, &json!({"stage": "WARM"})));
        assert!(!rule_holds(&rule, &json!({"stage": "COLD"})));

        let numeric = DependencyRule::equals_one_of("count", vec![json!(1)]);
        assert!(!rule_holds(&numeric, &json!({"count": "1"})));
    }

    #[test]
    fn all_rules_must_hold() {
        let field = FieldDescriptor::text("City", "city")
            .visible_when(DependencyRule::equals_one_of("country", vec![json!("INDIA")]))
            .visible_when(DependencyRule::not_equals("state", "OTHERS"));
        let shown = json!({"country": "INDIA", "state": "KA"});
        let hidden = json!({"country": "INDIA", "state": "OTHERS"});
        assert!(is_visible(field.visibility.as_ref(), &shown));
        assert!(!is_visible(field.visibility.as_ref(), &hidden));
    }

    #[test]
    fn file_fields_move_to_the_end() {
        let fields = vec![
            FieldDescriptor::new(
                "Photo",
                "photo",
                FieldKind::File {
                    folder_hint: None,
                    accept: None,
                },
            ),
            FieldDescriptor::text("Name", "name"),
            FieldDescriptor::new(
                "Docs",
                "docs",
                FieldKind::FileArray {
                    folder_hint: None,
                    accept: None,
                },
            ),
            FieldDescriptor::text("Email", "email"),
        ];
        let state = json!({});
        assert_eq!(
            paths(&visible_fields(&fields, &state)),
            ["name", "email", "photo", "docs"]
        );
    }
}
