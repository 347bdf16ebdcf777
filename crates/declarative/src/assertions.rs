//! Structural assertions against a synthesized document
//!
//! Everything here is a read: a [`Template`] wraps a finished [`Document`]
//! and never changes it. Failures are [`AssertionFailure`] values rather
//! than [`crate::Error`], so a test suite can run every check and report
//! each one on its own.

use crate::diff::{diff_values, join_index, join_key, PathChange};
use crate::error::Result;
use crate::synth::{Document, Entry};
use crate::types::ResourceKind;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Why an assertion did not hold
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssertionFailure {
    /// No entry of the kind matched the expected sub-tree
    #[error("no {kind} matches {expected} at '{path}' ({candidates} candidates){}", detail_suffix(.closest))]
    NoMatch {
        kind: ResourceKind,
        path: String,
        expected: Value,
        candidates: usize,
        /// First mismatch of the first candidate that did not match
        closest: Option<String>,
    },

    /// The number of matching entries was not the expected count
    #[error("expected {expected_count} {kind} matching at '{path}', found {actual_count}")]
    CountMismatch {
        kind: ResourceKind,
        path: String,
        expected_count: usize,
        actual_count: usize,
    },

    /// The current document differs from the stored snapshot
    #[error("snapshot differs in {} place(s)", .changes.len())]
    SnapshotMismatch { changes: Vec<PathChange> },

    /// Same structure, but the stored text differs (key order or formatting)
    #[error("snapshot differs only in layout; regenerate it")]
    SnapshotLayout,

    /// The stored snapshot could not be read as a document
    #[error("stored snapshot is not valid JSON: {message}")]
    InvalidSnapshot { message: String },
}

fn detail_suffix(closest: &Option<String>) -> String {
    closest
        .as_ref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

/// How a query's matches are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// At least one entry matches
    Exact,
    /// Exactly `n` entries match
    CountEquals(usize),
}

/// A read-only check against a template
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionQuery {
    pub name: Option<String>,
    pub kind: ResourceKind,
    /// Keys (or array indices) leading from `Properties` to the sub-tree
    pub path: Vec<String>,
    /// Partial sub-tree to match; `None` matches every entry of the kind
    pub expected: Option<Value>,
    pub mode: MatchMode,
}

impl AssertionQuery {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            name: None,
            kind,
            path: Vec::new(),
            expected: None,
            mode: MatchMode::Exact,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Narrow the match to the sub-tree at this property path
    pub fn at<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn expect(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn count(mut self, n: usize) -> Self {
        self.mode = MatchMode::CountEquals(n);
        self
    }

    fn display_path(&self) -> String {
        let mut out = String::from("Properties");
        for segment in &self.path {
            out = join_key(&out, segment);
        }
        out
    }

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let mode = match self.mode {
                MatchMode::Exact => "exists".to_string(),
                MatchMode::CountEquals(n) => format!("count = {n}"),
            };
            format!("{} at {} {mode}", self.kind, self.display_path())
        })
    }
}

/// Outcome of one query in a report
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub name: String,
    pub result: std::result::Result<(), AssertionFailure>,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-check results of a suite of queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionReport {
    pub outcomes: Vec<Outcome>,
}

impl AssertionReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }
}

impl fmt::Display for AssertionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} passed, {} failed", self.passed(), self.failed())
    }
}

/// Assertions over a synthesized document
#[derive(Debug, Clone)]
pub struct Template {
    document: Document,
}

impl Template {
    pub fn from_document(document: Document) -> Self {
        Self { document }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_document(Document::from_json(json)?))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Entries of `kind` whose properties partially match `expected`
    pub fn find_resources(&self, kind: ResourceKind, expected: &Value) -> Vec<(&str, &Entry)> {
        self.document
            .entries_of(kind)
            .filter(|(_, entry)| first_mismatch("", expected, &properties_value(entry)).is_none())
            .collect()
    }

    /// At least one entry of `kind` has properties matching `expected`
    pub fn has_resource_properties(
        &self,
        kind: ResourceKind,
        expected: Value,
    ) -> std::result::Result<(), AssertionFailure> {
        self.evaluate(&AssertionQuery::new(kind).expect(expected))
    }

    /// Exactly `count` entries of `kind` have properties matching `expected`
    pub fn resource_properties_count_is(
        &self,
        kind: ResourceKind,
        expected: Value,
        count: usize,
    ) -> std::result::Result<(), AssertionFailure> {
        self.evaluate(&AssertionQuery::new(kind).expect(expected).count(count))
    }

    /// Exactly `count` entries of `kind` exist
    pub fn resource_count_is(
        &self,
        kind: ResourceKind,
        count: usize,
    ) -> std::result::Result<(), AssertionFailure> {
        self.evaluate(&AssertionQuery::new(kind).count(count))
    }

    /// Run one query
    pub fn evaluate(&self, query: &AssertionQuery) -> std::result::Result<(), AssertionFailure> {
        let mut matched = 0;
        let mut candidates = 0;
        let mut closest: Option<String> = None;

        for (_, entry) in self.document.entries_of(query.kind) {
            candidates += 1;
            let props = properties_value(entry);
            let Some(actual) = lookup(&props, &query.path) else {
                closest.get_or_insert_with(|| format!("{} is missing", query.display_path()));
                continue;
            };
            let mismatch = query
                .expected
                .as_ref()
                .and_then(|expected| first_mismatch(&query.display_path(), expected, actual));
            match mismatch {
                None => matched += 1,
                Some(detail) => {
                    closest.get_or_insert(detail);
                }
            }
        }

        match query.mode {
            MatchMode::Exact if matched > 0 => Ok(()),
            MatchMode::Exact => Err(AssertionFailure::NoMatch {
                kind: query.kind,
                path: query.display_path(),
                expected: query.expected.clone().unwrap_or(Value::Null),
                candidates,
                closest,
            }),
            MatchMode::CountEquals(n) if n == matched => Ok(()),
            MatchMode::CountEquals(n) => Err(AssertionFailure::CountMismatch {
                kind: query.kind,
                path: query.display_path(),
                expected_count: n,
                actual_count: matched,
            }),
        }
    }

    /// Run every query, collecting one outcome per query
    pub fn evaluate_all<'a, I>(&self, queries: I) -> AssertionReport
    where
        I: IntoIterator<Item = &'a AssertionQuery>,
    {
        AssertionReport {
            outcomes: queries
                .into_iter()
                .map(|q| Outcome {
                    name: q.label(),
                    result: self.evaluate(q),
                })
                .collect(),
        }
    }

    /// Serialized form used as a snapshot
    pub fn to_snapshot(&self) -> Result<String> {
        self.document.to_json()
    }

    /// Compare against a stored snapshot
    ///
    /// On a structural difference the failure lists every changed path. A
    /// different resource order is reported as a change at `Resources`.
    pub fn match_snapshot(&self, stored: &str) -> std::result::Result<(), AssertionFailure> {
        let current = self
            .to_snapshot()
            .map_err(|e| AssertionFailure::InvalidSnapshot {
                message: e.to_string(),
            })?;
        if current.trim_end() == stored.trim_end() {
            return Ok(());
        }

        let stored_value: Value =
            serde_json::from_str(stored).map_err(|e| AssertionFailure::InvalidSnapshot {
                message: e.to_string(),
            })?;
        let current_value: Value =
            serde_json::from_str(&current).map_err(|e| AssertionFailure::InvalidSnapshot {
                message: e.to_string(),
            })?;

        let mut changes = Vec::new();
        if let Ok(document) = Document::from_json(stored) {
            let before = resource_order(&document);
            let after = resource_order(&self.document);
            if before != after {
                changes.push(PathChange::Changed {
                    path: "Resources".to_string(),
                    before: Value::from(before),
                    after: Value::from(after),
                });
            }
        }
        changes.extend(diff_values(&stored_value, &current_value));

        if changes.is_empty() {
            return Err(AssertionFailure::SnapshotLayout);
        }
        Err(AssertionFailure::SnapshotMismatch { changes })
    }
}

/// Logical ids in the order the document lists them
fn resource_order(document: &Document) -> Vec<String> {
    document.resources().map(|(id, _)| id.to_string()).collect()
}

fn properties_value(entry: &Entry) -> Value {
    Value::Object(entry.properties.clone())
}

/// Walk object keys (and numeric array indices) from `root`
fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// First place where `actual` fails to partially match `expected`
///
/// Objects match when every expected key matches (extra keys are ignored);
/// arrays need the same length with each element partially matching;
/// anything else must be equal.
pub fn first_mismatch(path: &str, expected: &Value, actual: &Value) -> Option<String> {
    match (expected, actual) {
        (Value::Object(want), Value::Object(have)) => want.iter().find_map(|(key, value)| {
            let child = join_key(path, key);
            match have.get(key) {
                Some(found) => first_mismatch(&child, value, found),
                None => Some(format!("{child} is missing")),
            }
        }),
        (Value::Array(want), Value::Array(have)) => {
            if want.len() != have.len() {
                return Some(format!(
                    "{path} has {} elements, expected {}",
                    have.len(),
                    want.len()
                ));
            }
            want.iter()
                .zip(have)
                .enumerate()
                .find_map(|(i, (w, h))| first_mismatch(&join_index(path, i), w, h))
        }
        (want, have) if want == have => None,
        (want, have) => Some(format!("{path}: expected {want}, found {have}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::resource::Declaration;
    use crate::synth::synthesize;
    use serde_json::json;

    fn template() -> Template {
        let graph = Graph::compose(
            vec![
                Declaration::new("A", ResourceKind::Function)
                    .property("FunctionName", "a")
                    .property("Timeout", 120u64)
                    .property("Architectures", json!(["arm64"])),
                Declaration::new("B", ResourceKind::Function)
                    .property("FunctionName", "b")
                    .property("Timeout", 60u64),
                Declaration::new("L", ResourceKind::LogSink)
                    .property("LogGroupName", "logs"),
            ],
            vec![],
        )
        .unwrap();
        Template::from_document(synthesize(&graph).unwrap())
    }

    #[test]
    fn test_partial_match_ignores_extra_keys() {
        let t = template();
        assert!(t
            .has_resource_properties(ResourceKind::Function, json!({"FunctionName": "a"}))
            .is_ok());
        assert_eq!(
            t.find_resources(ResourceKind::Function, &json!({"Timeout": 60})).len(),
            1
        );
    }

    #[test]
    fn test_no_match_explains_closest_difference() {
        let err = template()
            .has_resource_properties(ResourceKind::Function, json!({"FunctionName": "a", "Timeout": 30}))
            .unwrap_err();
        match err {
            AssertionFailure::NoMatch {
                candidates,
                closest,
                ..
            } => {
                assert_eq!(candidates, 2);
                assert!(closest.unwrap().contains("expected 30"));
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[test]
    fn test_closest_is_first_candidate_mismatch() {
        let err = template()
            .has_resource_properties(ResourceKind::Function, json!({"Timeout": 30}))
            .unwrap_err();
        assert!(matches!(
            err,
            AssertionFailure::NoMatch { closest: Some(detail), .. }
                if detail == "Properties.Timeout: expected 30, found 120"
        ));
    }

    #[test]
    fn test_arrays_must_match_length() {
        let t = template();
        assert!(t
            .has_resource_properties(ResourceKind::Function, json!({"Architectures": ["arm64"]}))
            .is_ok());
        assert!(t
            .has_resource_properties(
                ResourceKind::Function,
                json!({"Architectures": ["arm64", "x86_64"]})
            )
            .is_err());
    }

    #[test]
    fn test_counts() {
        let t = template();
        assert!(t.resource_count_is(ResourceKind::Function, 2).is_ok());
        assert!(t.resource_count_is(ResourceKind::Role, 0).is_ok());
        assert_eq!(
            t.resource_count_is(ResourceKind::Function, 1),
            Err(AssertionFailure::CountMismatch {
                kind: ResourceKind::Function,
                path: "Properties".into(),
                expected_count: 1,
                actual_count: 2,
            })
        );
        assert!(t
            .resource_properties_count_is(ResourceKind::LogSink, json!({"LogGroupName": "logs"}), 1)
            .is_ok());
    }

    #[test]
    fn test_query_at_path() {
        let t = template();
        let query = AssertionQuery::new(ResourceKind::Function)
            .at(["Architectures", "0"])
            .expect(json!("arm64"))
            .count(1);
        assert!(t.evaluate(&query).is_ok());

        let missing = AssertionQuery::new(ResourceKind::Function).at(["Nope"]);
        assert!(t.evaluate(&missing).is_err());
    }

    #[test]
    fn test_report_collects_every_outcome() {
        let t = template();
        let queries = vec![
            AssertionQuery::new(ResourceKind::Function).count(2),
            AssertionQuery::new(ResourceKind::Function).count(3).named("three functions"),
            AssertionQuery::new(ResourceKind::LogSink),
        ];
        let report = t.evaluate_all(&queries);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().next().unwrap().name, "three functions");
        assert_eq!(report.to_string(), "2 passed, 1 failed");
    }

    #[test]
    fn test_snapshot_round_trip_and_change() {
        let t = template();
        let stored = t.to_snapshot().unwrap();
        assert!(t.match_snapshot(&stored).is_ok());

        let edited = stored.replace("\"Timeout\": 60", "\"Timeout\": 90");
        match t.match_snapshot(&edited) {
            Err(AssertionFailure::SnapshotMismatch { changes }) => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].path(), "Resources.B.Properties.Timeout");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_reports_resource_order() {
        let t = template();
        let entry = |id: &str| serde_json::to_string(t.document().get(id).unwrap()).unwrap();
        let stored = format!(
            r#"{{"Resources": {{"B": {}, "A": {}, "L": {}}}}}"#,
            entry("B"),
            entry("A"),
            entry("L")
        );

        assert_eq!(
            t.match_snapshot(&stored),
            Err(AssertionFailure::SnapshotMismatch {
                changes: vec![PathChange::Changed {
                    path: "Resources".into(),
                    before: json!(["B", "A", "L"]),
                    after: json!(["A", "B", "L"]),
                }],
            })
        );
    }

    #[test]
    fn test_snapshot_layout_only() {
        let t = template();
        let compact = serde_json::to_string(t.document()).unwrap();
        assert_eq!(t.match_snapshot(&compact), Err(AssertionFailure::SnapshotLayout));
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        assert!(matches!(
            template().match_snapshot("not json"),
            Err(AssertionFailure::InvalidSnapshot { .. })
        ));
    }
}
