//! # Declarative
//!
//! Declarative resource graphs: declare typed infrastructure resources,
//! wire them together by logical id, and synthesize a stable template that
//! can be checked with structural assertions.
//!
//! ## Core Concepts
//!
//! - **Declaration**: One typed resource with properties and references
//! - **Resolver**: Replaces reference markers with resolved identifiers and records edges
//! - **Graph**: Validated DAG of declarations (unique ids, known endpoints, no cycles)
//! - **Document**: The synthesized template, resources in dependency order
//! - **Template**: Read-only assertions and snapshot matching over a document
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     CronSchedule, Function, LogGroup, ResourceKind, RetentionDays, Runtime, Schedule,
//!     ScheduleRule, Stack,
//! };
//! use serde_json::json;
//!
//! let mut stack = Stack::new("Notifier");
//! stack
//!     .add(LogGroup::new("LogGroup").retention(RetentionDays::OneWeek))?
//!     .add(
//!         Function::new("Lambda", "function.zip", Runtime::ProvidedAl2023, "bootstrap")
//!             .log_group("LogGroup"),
//!     )?
//!     .add(
//!         ScheduleRule::new("Rule", Schedule::Cron(CronSchedule::default().minute("0").hour("9")))
//!             .target("Lambda"),
//!     )?;
//!
//! let template = stack.template()?;
//! assert!(template.resource_count_is(ResourceKind::Function, 1).is_ok());
//! assert!(template
//!     .has_resource_properties(
//!         ResourceKind::ScheduleRule,
//!         json!({"ScheduleExpression": "cron(0 9 * * ? *)"})
//!     )
//!     .is_ok());
//! # Ok::<(), declarative::Error>(())
//! ```

pub mod assertions;
pub mod diff;
pub mod error;
pub mod graph;
pub mod kinds;
pub mod resolve;
pub mod resource;
pub mod stack;
pub mod synth;
pub mod types;

// Re-export main types at crate root
pub use assertions::{
    AssertionFailure, AssertionQuery, AssertionReport, MatchMode, Outcome, Template,
};
pub use diff::{diff_values, group_by_resource, DiffSummary, PathChange};
pub use error::{Error, Result};
pub use graph::Graph;
pub use kinds::{
    Architecture, Conditions, CronSchedule, Effect, Function, LogGroup, LoggingFormat,
    OidcProvider, Policy, Principal, RemovalPolicy, RetentionDays, Role, Runtime, Schedule,
    ScheduleRule, Statement,
};
pub use resolve::{resolve, Resolution};
pub use resource::{Declaration, Resource};
pub use stack::Stack;
pub use synth::{synthesize, Document, Entry};
pub use types::{
    resolved_identifier, Attribute, DeletionPolicy, Edge, PropertyValue, Reference, Relation,
    ResourceKind,
};
