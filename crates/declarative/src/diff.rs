//! Structural diff between two JSON documents
//!
//! Used by snapshot matching: every difference is reported as the path it
//! occurs at, so a changed property value shows up as exactly one entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One difference between a stored and a current document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathChange {
    /// Present now, absent before
    Added { path: String, value: Value },
    /// Present before, absent now
    Removed { path: String, value: Value },
    /// Present in both with different values
    Changed {
        path: String,
        before: Value,
        after: Value,
    },
}

impl PathChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Changed { path, .. } => {
                path
            }
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, Self::Added { .. })
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }

    pub fn is_modification(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// Logical id of the resource this change falls under, for paths of
    /// the form `Resources.<id>...` or `Resources["<id>"]...`
    pub fn logical_id(&self) -> Option<Cow<'_, str>> {
        let path = self.path();
        if let Some(rest) = path.strip_prefix("Resources.") {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            return Some(Cow::Borrowed(&rest[..end]));
        }
        let quoted = path.strip_prefix("Resources[")?;
        let end = closing_quote(quoted)?;
        serde_json::from_str::<String>(&quoted[..=end])
            .ok()
            .map(Cow::Owned)
    }
}

impl fmt::Display for PathChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { path, value } => write!(f, "+ {path}: {value}"),
            Self::Removed { path, value } => write!(f, "- {path}: {value}"),
            Self::Changed {
                path,
                before,
                after,
            } => write!(f, "~ {path}: {before} -> {after}"),
        }
    }
}

/// Byte offset of the quote closing the JSON string `quoted` starts with
fn closing_quote(quoted: &str) -> Option<usize> {
    if !quoted.starts_with('"') {
        return None;
    }
    let mut escaped = false;
    for (i, c) in quoted.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Join a parent path and an object key
///
/// Keys that would be ambiguous in dotted form are quoted as JSON strings.
pub fn join_key(parent: &str, key: &str) -> String {
    if key.contains(['.', '[', ']']) {
        format!("{parent}[{}]", Value::from(key))
    } else if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Join a parent path and an array index
pub fn join_index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// Compute every path at which `after` differs from `before`
///
/// Object keys are walked in ascending order and arrays index by index, so
/// the output is deterministic.
pub fn diff_values(before: &Value, after: &Value) -> Vec<PathChange> {
    let mut changes = Vec::new();
    diff_at("", before, after, &mut changes);
    changes
}

fn diff_at(path: &str, before: &Value, after: &Value, out: &mut Vec<PathChange>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let child = join_key(path, key);
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => diff_at(&child, x, y, out),
                    (Some(x), None) => out.push(PathChange::Removed {
                        path: child,
                        value: x.clone(),
                    }),
                    (None, Some(y)) => out.push(PathChange::Added {
                        path: child,
                        value: y.clone(),
                    }),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for i in 0..a.len().max(b.len()) {
                let child = join_index(path, i);
                match (a.get(i), b.get(i)) {
                    (Some(x), Some(y)) => diff_at(&child, x, y, out),
                    (Some(x), None) => out.push(PathChange::Removed {
                        path: child,
                        value: x.clone(),
                    }),
                    (None, Some(y)) => out.push(PathChange::Added {
                        path: child,
                        value: y.clone(),
                    }),
                    (None, None) => {}
                }
            }
        }
        (x, y) if x != y => out.push(PathChange::Changed {
            path: path.to_string(),
            before: x.clone(),
            after: y.clone(),
        }),
        _ => {}
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of changes
    pub fn from_changes(changes: &[PathChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change {
                PathChange::Added { .. } => summary.additions += 1,
                PathChange::Removed { .. } => summary.removals += 1,
                PathChange::Changed { .. } => summary.modifications += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group changes by the resource they fall under; changes outside
/// `Resources` are grouped under the empty string
pub fn group_by_resource(changes: &[PathChange]) -> BTreeMap<String, Vec<&PathChange>> {
    let mut groups: BTreeMap<String, Vec<&PathChange>> = BTreeMap::new();
    for change in changes {
        groups
            .entry(change.logical_id().map(Cow::into_owned).unwrap_or_default())
            .or_default()
            .push(change);
    }
    groups
}
