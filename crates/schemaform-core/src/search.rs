//! Searchable select support.

use crate::descriptor::SelectOption;
use serde_json::Value;

/// Options whose label contains `query`, ignoring case, in their original
/// order. A blank query keeps everything.
pub fn filter_options<'a>(options: &'a [SelectOption], query: &str) -> Vec<&'a SelectOption> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return options.iter().collect();
    }
    options
        .iter()
        .filter(|option| option.label.to_lowercase().contains(&needle))
        .collect()
}

pub fn option_label<'a>(options: &'a [SelectOption], value: &Value) -> Option<&'a str> {
    options
        .iter()
        .find(|option| &option.value == value)
        .map(|option| option.label.as_str())
}
