//! Resource declarations
//!
//! A [`Declaration`] is the generic, immutable record of one infrastructure
//! primitive. Typed builders (see [`crate::kinds`]) implement [`Resource`]
//! and lower themselves into declarations; anything provider-specific that
//! the typed builders don't model can still be set through
//! [`Declaration::property`].

use crate::error::Result;
use crate::types::{DeletionPolicy, PropertyValue, Reference, ResourceKind};
use std::collections::BTreeMap;
use std::fmt;

/// One typed infrastructure primitive, identified by its logical id
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    logical_id: String,
    kind: ResourceKind,
    properties: BTreeMap<String, PropertyValue>,
    depends_on: Vec<String>,
    deletion_policy: Option<DeletionPolicy>,
}

impl Declaration {
    /// Create an empty declaration of the given kind
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
            deletion_policy: None,
        }
    }

    /// Set a property, replacing any earlier value under the same key
    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property only when a value is present
    pub fn property_opt<V: Into<PropertyValue>>(
        self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(v) => self.property(key, v),
            None => self,
        }
    }

    /// Add an ordering dependency on another declaration
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let id = logical_id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Set the deletion policy written alongside the properties
    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn explicit_dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub fn deletion_policy_value(&self) -> Option<DeletionPolicy> {
        self.deletion_policy
    }

    /// Every outgoing reference: property markers in key order, then
    /// explicit dependencies in the order they were added
    pub fn references(&self) -> Vec<Reference> {
        let mut refs: Vec<Reference> = self
            .properties
            .values()
            .flat_map(PropertyValue::references)
            .cloned()
            .collect();
        refs.extend(self.depends_on.iter().map(Reference::to));
        refs
    }

    /// Logical ids this declaration points at, in reference order
    pub fn reference_ids(&self) -> Vec<String> {
        self.references().into_iter().map(|r| r.target).collect()
    }

    /// Copy of this declaration with new property values and no explicit
    /// dependencies, used once references have been resolved into edges
    pub(crate) fn with_properties(&self, properties: BTreeMap<String, PropertyValue>) -> Self {
        Self {
            logical_id: self.logical_id.clone(),
            kind: self.kind,
            properties,
            depends_on: Vec::new(),
            deletion_policy: self.deletion_policy,
        }
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.logical_id, self.kind)
    }
}

/// Core trait for typed resource builders
///
/// Each implementation knows its kind and how to lay its properties out
/// in the template format. Lowering is fallible so that structured values
/// (schedules, retention periods) can be checked once, up front.
pub trait Resource: fmt::Debug {
    /// Stable, human-assigned identifier, unique within a stack
    fn logical_id(&self) -> &str;

    /// Kind of primitive this builder produces
    fn kind(&self) -> ResourceKind;

    /// Lower into a generic declaration
    fn to_declaration(&self) -> Result<Declaration>;
}

impl Resource for Declaration {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn to_declaration(&self) -> Result<Declaration> {
        Ok(self.clone())
    }
}
