//! Field-level change summaries for update entries

use std::collections::BTreeSet;

use serde_json::Value;

/// Bumped on every write, so never interesting
const SKIPPED_FIELDS: [&str; 2] = ["updated_at", "calculated_at"];

const MAX_SHOWN_CHARS: usize = 50;

/// Summarize what changed between two snapshots as `field: old -> new`
/// pairs, or `None` when nothing meaningful did
pub fn generate_diff(before: &Value, after: &Value) -> Option<String> {
    let (Value::Object(old), Value::Object(new)) = (before, after) else {
        return (before != after).then(|| format!("{} -> {}", show(before), show(after)));
    };

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let changes: Vec<String> = keys
        .into_iter()
        .filter(|key| !SKIPPED_FIELDS.contains(&key.as_str()))
        .filter_map(|key| match (old.get(key), new.get(key)) {
            (Some(a), Some(b)) if a != b => Some(format!("{}: {} -> {}", key, show(a), show(b))),
            (Some(a), None) => Some(format!("{}: {} -> (removed)", key, show(a))),
            (None, Some(b)) => Some(format!("{}: (added) -> {}", key, show(b))),
            _ => None,
        })
        .collect();

    (!changes.is_empty()).then(|| changes.join(", "))
}

fn show(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > MAX_SHOWN_CHARS => {
            let head: String = s.chars().take(MAX_SHOWN_CHARS - 3).collect();
            format!("\"{}...\"", head)
        }
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(fields) => format!("{{{} fields}}", fields.len()),
        other => other.to_string(),
    }
}
