//! Graph composition - validates declarations and edges into one DAG

use crate::error::{Error, Result};
use crate::resource::Declaration;
use crate::types::Edge;
use indexmap::IndexMap;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// A validated dependency graph for one stack
///
/// Only obtainable through [`Graph::compose`], so every `Graph` value has
/// unique logical ids, edges whose endpoints exist, and no cycles.
#[derive(Debug, Clone)]
pub struct Graph {
    declarations: IndexMap<String, Declaration>,
    edges: Vec<Edge>,
    /// Outgoing: logical id -> ids it depends on
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Incoming: logical id -> ids that depend on it
    dependents: BTreeMap<String, BTreeSet<String>>,
    order: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

impl Graph {
    /// Validate and assemble a graph
    ///
    /// Checks, in order: unique logical ids, edge endpoints exist, no cycles.
    /// A pure function of its inputs: the same declarations and edges
    /// always compose the same graph, regardless of edge order.
    pub fn compose(declarations: Vec<Declaration>, edges: Vec<Edge>) -> Result<Self> {
        let mut by_id: IndexMap<String, Declaration> = IndexMap::with_capacity(declarations.len());
        for decl in declarations {
            let id = decl.logical_id().to_string();
            if by_id.contains_key(&id) {
                return Err(Error::DuplicateIdentifier { logical_id: id });
            }
            by_id.insert(id, decl);
        }

        let mut dependencies: BTreeMap<String, BTreeSet<String>> =
            by_id.keys().map(|id| (id.clone(), BTreeSet::new())).collect();
        let mut dependents = dependencies.clone();

        for edge in &edges {
            for endpoint in [&edge.from, &edge.to] {
                if !by_id.contains_key(endpoint) {
                    return Err(Error::UnresolvedReference {
                        source_id: edge.from.clone(),
                        target: endpoint.clone(),
                    });
                }
            }
            if let Some(out) = dependencies.get_mut(&edge.from) {
                out.insert(edge.to.clone());
            }
            if let Some(incoming) = dependents.get_mut(&edge.to) {
                incoming.insert(edge.from.clone());
            }
        }

        if let Some(path) = find_cycle(&dependencies) {
            return Err(Error::CyclicDependency { path });
        }

        let order = topological_order(&dependencies, &dependents)?;
        debug!(
            "composed graph: {} declarations, {} edges, order [{}]",
            by_id.len(),
            edges.len(),
            order.join(", ")
        );

        let mut edges = edges;
        edges.sort();
        edges.dedup();

        Ok(Self {
            declarations: by_id,
            edges,
            dependencies,
            dependents,
            order,
        })
    }

    /// Look up a declaration by logical id
    pub fn get(&self, logical_id: &str) -> Option<&Declaration> {
        self.declarations.get(logical_id)
    }

    /// Declarations in the order they were composed
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// Declarations with dependencies first, ties broken by ascending logical id
    pub fn ordered(&self) -> impl Iterator<Item = &Declaration> {
        self.order.iter().filter_map(|id| self.declarations.get(id))
    }

    /// Logical ids in topological order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// All edges, sorted
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Logical ids `logical_id` depends on, ascending
    pub fn dependencies_of(&self, logical_id: &str) -> Vec<&str> {
        self.dependencies
            .get(logical_id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Logical ids that depend on `logical_id`, ascending
    pub fn dependents_of(&self, logical_id: &str) -> Vec<&str> {
        self.dependents
            .get(logical_id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// Depth-first search with three-color marking
///
/// Returns the first cycle found as a path whose first and last entries
/// are the same logical id. Nodes and neighbours are visited in ascending
/// order so the reported cycle is stable.
fn find_cycle(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Option<Vec<String>> {
    fn visit(
        node: &str,
        dependencies: &BTreeMap<String, BTreeSet<String>>,
        colors: &mut BTreeMap<String, Color>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        colors.insert(node.to_string(), Color::InProgress);
        stack.push(node.to_string());

        if let Some(next) = dependencies.get(node) {
            for dep in next {
                match colors.get(dep.as_str()).copied().unwrap_or(Color::Unvisited) {
                    Color::Done => {}
                    Color::InProgress => {
                        // back-edge: the cycle is the stack from dep onwards
                        let start = stack.iter().position(|n| n == dep).unwrap_or(0);
                        let mut path = stack[start..].to_vec();
                        path.push(dep.clone());
                        return Some(path);
                    }
                    Color::Unvisited => {
                        if let Some(path) = visit(dep, dependencies, colors, stack) {
                            return Some(path);
                        }
                    }
                }
            }
        }

        stack.pop();
        colors.insert(node.to_string(), Color::Done);
        None
    }

    let mut colors: BTreeMap<String, Color> = BTreeMap::new();
    let mut stack = Vec::new();
    for node in dependencies.keys() {
        if colors.get(node.as_str()).is_none() {
            stack.clear();
            if let Some(path) = visit(node, dependencies, &mut colors, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}

/// Kahn's algorithm, always taking the smallest ready logical id next
fn topological_order(
    dependencies: &BTreeMap<String, BTreeSet<String>>,
    dependents: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>> {
    let mut pending: BTreeMap<&str, usize> = dependencies
        .iter()
        .map(|(id, deps)| (id.as_str(), deps.len()))
        .collect();
    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(pending.len());
    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    if order.len() != pending.len() {
        let stuck: Vec<String> = pending
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| (*id).to_string())
            .collect();
        return Err(Error::CyclicDependency { path: stuck });
    }
    Ok(order)
}
