//! Reference resolution
//!
//! Turns the reference markers held by declarations into resolved
//! identifiers and records one dependency edge per distinct reference.

use crate::error::{Error, Result};
use crate::resource::Declaration;
use crate::types::{Edge, PropertyValue, Reference, Relation};
use log::trace;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Declarations with every reference marker replaced, plus the edges those
/// references produced
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub declarations: Vec<Declaration>,
    pub edges: Vec<Edge>,
}

/// Resolve every reference in `declarations` against the same set
///
/// Fails with [`Error::UnresolvedReference`] on the first reference whose
/// target is not declared. Declarations keep their input order; edges are
/// listed in the order they were discovered, without duplicates.
pub fn resolve(declarations: &[Declaration]) -> Result<Resolution> {
    let known: HashMap<&str, &Declaration> = declarations
        .iter()
        .map(|d| (d.logical_id(), d))
        .collect();

    let mut edges = Vec::new();
    let mut seen: HashSet<Edge> = HashSet::new();
    let mut resolved = Vec::with_capacity(declarations.len());

    for decl in declarations {
        let source = decl.logical_id();
        let mut record = |target: &str, relation: Relation| -> Result<()> {
            if !known.contains_key(target) {
                return Err(Error::UnresolvedReference {
                    source_id: source.to_string(),
                    target: target.to_string(),
                });
            }
            let edge = Edge::new(source, target, relation);
            if seen.insert(edge.clone()) {
                trace!("edge {source} -> {target} ({relation:?})");
                edges.push(edge);
            }
            Ok(())
        };

        let mut properties = BTreeMap::new();
        for (key, value) in decl.properties() {
            let value = value.resolve_with(&mut |reference: &Reference| {
                record(&reference.target, reference.relation)?;
                Ok(reference.resolved())
            })?;
            properties.insert(key.clone(), value);
        }
        for dep in decl.explicit_dependencies() {
            record(dep, Relation::ImplicitDependency)?;
        }

        debug_assert!(properties.values().all(PropertyValue::is_resolved));
        resolved.push(decl.with_properties(properties));
    }

    Ok(Resolution {
        declarations: resolved,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;
    use serde_json::json;

    fn function(id: &str) -> Declaration {
        Declaration::new(id, ResourceKind::Function)
    }

    #[test]
    fn test_resolves_markers_to_identifiers() {
        let decls = vec![
            Declaration::new("L", ResourceKind::LogSink),
            function("F").property(
                "LoggingConfig",
                PropertyValue::map([("LogGroup", PropertyValue::reference("L"))]),
            ),
        ];
        let resolution = resolve(&decls).unwrap();

        let f = &resolution.declarations[1];
        assert!(f.properties().values().all(PropertyValue::is_resolved));
        assert_eq!(
            f.properties()["LoggingConfig"].to_json().unwrap(),
            json!({"LogGroup": "${L}"})
        );
        assert_eq!(
            resolution.edges,
            vec![Edge::new("F", "L", Relation::ImplicitDependency)]
        );
    }

    #[test]
    fn test_missing_target_names_both_ids() {
        let decls = vec![function("F").property("Role", PropertyValue::arn("Nope"))];
        match resolve(&decls) {
            Err(Error::UnresolvedReference { source_id, target }) => {
                assert_eq!(source_id, "F");
                assert_eq!(target, "Nope");
            }
            other => panic!("expected UnresolvedReference, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_explicit_dependency_is_unresolved() {
        let decls = vec![function("F").depends_on("Ghost")];
        assert!(matches!(
            resolve(&decls),
            Err(Error::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_rule_target_edge_is_explicit() {
        let decls = vec![
            function("F"),
            Declaration::new("R", ResourceKind::ScheduleRule).property(
                "Targets",
                PropertyValue::list([PropertyValue::map([(
                    "Arn",
                    PropertyValue::Ref(Reference::arn("F").as_target()),
                )])]),
            ),
        ];
        let resolution = resolve(&decls).unwrap();
        assert_eq!(
            resolution.edges,
            vec![Edge::new("R", "F", Relation::ExplicitTarget)]
        );
    }

    #[test]
    fn test_repeated_references_make_one_edge() {
        let decls = vec![
            function("F"),
            Declaration::new("P", ResourceKind::PolicyStatement)
                .property("A", PropertyValue::arn("F"))
                .property("B", PropertyValue::reference("F"))
                .depends_on("F"),
        ];
        assert_eq!(resolve(&decls).unwrap().edges.len(), 1);
    }
}
