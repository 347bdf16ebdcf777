//! Template synthesis - walks a composed graph and emits the document
//!
//! The document is the only artefact handed to the provisioning backend
//! and to the assertion engine. It holds plain JSON only: no reference
//! markers survive synthesis.

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::types::{DeletionPolicy, ResourceKind};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One resource in the synthesized document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entry {
    #[serde(rename = "Type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
}

/// The synthesized template: resources keyed by logical id, in
/// dependency order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Resources", default)]
    resources: IndexMap<String, Entry>,
}

impl Document {
    /// Entries in synthesis order
    pub fn resources(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.resources.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn get(&self, logical_id: &str) -> Option<&Entry> {
        self.resources.get(logical_id)
    }

    /// Entries of one kind, in synthesis order
    pub fn entries_of(&self, kind: ResourceKind) -> impl Iterator<Item = (&str, &Entry)> {
        self.resources().filter(move |(_, entry)| entry.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Pretty JSON with a trailing newline; byte-identical for equal documents
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// The document as a JSON value
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse a document previously written by [`Document::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Synthesize a composed graph into a document
///
/// Entries follow the graph's topological order. `DependsOn` lists the
/// entry's outgoing edges. Fails with [`Error::Synthesis`] if a property
/// still carries a reference marker or the order is inconsistent with the
/// edges.
pub fn synthesize(graph: &Graph) -> Result<Document> {
    let mut resources = IndexMap::with_capacity(graph.len());
    let mut emitted: HashSet<&str> = HashSet::with_capacity(graph.len());

    for id in graph.order() {
        let decl = graph
            .get(id)
            .ok_or_else(|| Error::synthesis(format!("'{id}' is ordered but not declared")))?;

        let mut properties = Map::new();
        for (key, value) in decl.properties() {
            if let Some(marker) = value.references().first() {
                return Err(Error::synthesis(format!(
                    "property '{key}' of '{id}' still references '{}'",
                    marker.target
                )));
            }
            properties.insert(key.clone(), value.to_json()?);
        }

        let depends_on: Vec<String> = graph
            .dependencies_of(id)
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(late) = depends_on.iter().find(|d| !emitted.contains(d.as_str())) {
            return Err(Error::synthesis(format!(
                "'{id}' depends on '{late}', which has not been emitted yet"
            )));
        }

        let policy = decl.deletion_policy_value();
        resources.insert(
            id.clone(),
            Entry {
                kind: decl.kind(),
                properties,
                depends_on,
                deletion_policy: policy,
                update_replace_policy: policy,
            },
        );
        emitted.insert(id.as_str());
    }

    if resources.len() != graph.len() {
        return Err(Error::synthesis(format!(
            "emitted {} of {} declarations",
            resources.len(),
            graph.len()
        )));
    }

    debug!("synthesized {} resources", resources.len());
    Ok(Document { resources })
}
