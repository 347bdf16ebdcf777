//! A stack: the declarations of one deployable unit, and the pipeline that
//! turns them into a document

use crate::assertions::Template;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::resolve::{resolve, Resolution};
use crate::resource::{Declaration, Resource};
use crate::synth::{synthesize, Document};
use log::debug;
use std::collections::HashSet;

/// Declarations for one deployable unit
///
/// Built once, in a single pass; resolution, composition and synthesis
/// all borrow the stack and leave it untouched.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    name: String,
    declarations: Vec<Declaration>,
    ids: HashSet<String>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower a typed resource and add it to the stack
    pub fn add(&mut self, resource: impl Resource) -> Result<&mut Self> {
        let decl = resource.to_declaration()?;
        self.add_declaration(decl)
    }

    /// Add a generic declaration
    pub fn add_declaration(&mut self, decl: Declaration) -> Result<&mut Self> {
        if !self.ids.insert(decl.logical_id().to_string()) {
            return Err(Error::DuplicateIdentifier {
                logical_id: decl.logical_id().to_string(),
            });
        }
        debug!("{}: declared {decl}", self.name);
        self.declarations.push(decl);
        Ok(self)
    }

    /// Declarations in the order they were added
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn get(&self, logical_id: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .find(|d| d.logical_id() == logical_id)
    }

    /// Resolve every reference marker into identifiers and edges
    pub fn resolve(&self) -> Result<Resolution> {
        resolve(&self.declarations)
    }

    /// Resolve and validate into a dependency graph
    pub fn compose(&self) -> Result<Graph> {
        let Resolution {
            declarations,
            edges,
        } = self.resolve()?;
        Graph::compose(declarations, edges)
    }

    /// Run the whole pipeline: resolve, compose, synthesize
    pub fn synthesize(&self) -> Result<Document> {
        let graph = self.compose()?;
        synthesize(&graph)
    }

    /// Synthesize and wrap the result for assertions
    pub fn template(&self) -> Result<Template> {
        Ok(Template::from_document(self.synthesize()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{CronSchedule, Function, LogGroup, Runtime, Schedule, ScheduleRule};
    use crate::types::{PropertyValue, ResourceKind};
    use serde_json::json;

    /// Log sink L, function F logging to L, rule R targeting F
    fn minimal() -> Stack {
        let mut stack = Stack::new("Test");
        stack
            .add(LogGroup::new("L").name("logs"))
            .unwrap()
            .add(Function::new("F", "f.zip", Runtime::ProvidedAl2023, "bootstrap").log_group("L"))
            .unwrap()
            .add(
                ScheduleRule::new("R", Schedule::Cron(CronSchedule::default().minute("0").hour("9")))
                    .target("F"),
            )
            .unwrap();
        stack
    }

    #[test]
    fn test_duplicate_logical_id() {
        let mut stack = minimal();
        let err = stack.add(LogGroup::new("L")).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentifier { logical_id } if logical_id == "L"));
        assert_eq!(stack.declarations().len(), 3);
    }

    #[test]
    fn test_function_and_rule_resolve_to_their_targets() {
        let template = minimal().template().unwrap();
        let doc = template.document();

        let functions: Vec<_> = doc.entries_of(ResourceKind::Function).collect();
        assert_eq!(functions.len(), 1);
        assert_eq!(
            functions[0].1.properties["LoggingConfig"]["LogGroup"],
            json!("${L}")
        );

        let rules: Vec<_> = doc.entries_of(ResourceKind::ScheduleRule).collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].1.properties["Targets"][0]["Arn"], json!("${F.Arn}"));
        assert_eq!(rules[0].1.depends_on, vec!["F"]);

        assert!(template.resource_count_is(ResourceKind::Function, 1).is_ok());
        assert!(template.resource_count_is(ResourceKind::Function, 2).is_err());
    }

    #[test]
    fn test_rule_comes_after_its_target() {
        let doc = minimal().synthesize().unwrap();
        let ids: Vec<&str> = doc.resources().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["L", "F", "R"]);
    }

    #[test]
    fn test_unresolved_reference_stops_before_synthesis() {
        let mut stack = minimal();
        stack
            .add(ScheduleRule::new("Orphan", Schedule::Expression("rate(1 day)".into())).target("Missing"))
            .unwrap();
        assert!(matches!(
            stack.synthesize(),
            Err(Error::UnresolvedReference { target, .. }) if target == "Missing"
        ));
    }

    #[test]
    fn test_cycle_never_produces_a_document() {
        let mut stack = Stack::new("Cyclic");
        stack
            .add_declaration(
                Declaration::new("A", ResourceKind::Role).property("P", PropertyValue::reference("B")),
            )
            .unwrap()
            .add_declaration(Declaration::new("B", ResourceKind::PolicyStatement).depends_on("A"))
            .unwrap();
        match stack.synthesize() {
            Err(Error::CyclicDependency { path }) => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let stack = minimal();
        assert_eq!(
            stack.synthesize().unwrap().to_json().unwrap(),
            stack.synthesize().unwrap().to_json().unwrap()
        );
        assert_eq!(
            minimal().synthesize().unwrap().to_json().unwrap(),
            stack.synthesize().unwrap().to_json().unwrap()
        );
    }
}
