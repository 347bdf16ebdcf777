//! Core types shared by declarations, the graph and the synthesized template

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of infrastructure primitive a declaration describes
///
/// Serialized as the provisioning type name. The identity provider has a
/// single canonical name; the construct-library spelling is accepted when
/// reading stored documents so older snapshots still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "AWS::Logs::LogGroup")]
    LogSink,
    #[serde(rename = "AWS::Lambda::Function")]
    Function,
    #[serde(rename = "AWS::Events::Rule")]
    ScheduleRule,
    #[serde(
        rename = "AWS::IAM::OIDCProvider",
        alias = "Custom::AWSCDKOpenIdConnectProvider"
    )]
    IdentityProvider,
    #[serde(rename = "AWS::IAM::Role")]
    Role,
    #[serde(rename = "AWS::IAM::Policy")]
    PolicyStatement,
}

impl ResourceKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 6] = [
        Self::LogSink,
        Self::Function,
        Self::ScheduleRule,
        Self::IdentityProvider,
        Self::Role,
        Self::PolicyStatement,
    ];

    /// Provisioning type name written into the template
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LogSink => "AWS::Logs::LogGroup",
            Self::Function => "AWS::Lambda::Function",
            Self::ScheduleRule => "AWS::Events::Rule",
            Self::IdentityProvider => "AWS::IAM::OIDCProvider",
            Self::Role => "AWS::IAM::Role",
            Self::PolicyStatement => "AWS::IAM::Policy",
        }
    }

    /// Parse a kind from its short name ("function") or type name
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "logsink" | "log_sink" | "loggroup" | "aws::logs::loggroup" => Some(Self::LogSink),
            "function" | "lambda" | "aws::lambda::function" => Some(Self::Function),
            "schedulerule" | "schedule_rule" | "rule" | "aws::events::rule" => {
                Some(Self::ScheduleRule)
            }
            "identityprovider" | "identity_provider" | "oidc" | "aws::iam::oidcprovider"
            | "custom::awscdkopenidconnectprovider" => Some(Self::IdentityProvider),
            "role" | "aws::iam::role" => Some(Self::Role),
            "policystatement" | "policy_statement" | "policy" | "aws::iam::policy" => {
                Some(Self::PolicyStatement)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LogSink => "LogSink",
            Self::Function => "Function",
            Self::ScheduleRule => "ScheduleRule",
            Self::IdentityProvider => "IdentityProvider",
            Self::Role => "Role",
            Self::PolicyStatement => "PolicyStatement",
        };
        f.write_str(name)
    }
}

/// Which value of the target a reference resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    /// The resource's primary identifier
    Ref,
    /// The resource's ARN
    Arn,
}

/// How an edge came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// A property (or explicit `depends_on`) needs the target to exist first
    ImplicitDependency,
    /// The source acts on the target, e.g. a schedule rule invoking a function
    ExplicitTarget,
}

/// A typed pointer from one declaration to another, by logical id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub target: String,
    pub attribute: Attribute,
    pub relation: Relation,
}

impl Reference {
    /// Reference to a target's primary identifier
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: Attribute::Ref,
            relation: Relation::ImplicitDependency,
        }
    }

    /// Reference to a target's ARN
    pub fn arn(target: impl Into<String>) -> Self {
        Self {
            attribute: Attribute::Arn,
            ..Self::to(target)
        }
    }

    /// Mark this reference as an explicit target of its holder
    pub fn as_target(mut self) -> Self {
        self.relation = Relation::ExplicitTarget;
        self
    }

    /// The placeholder string this reference resolves to
    pub fn resolved(&self) -> String {
        resolved_identifier(&self.target, self.attribute)
    }
}

/// Deterministic placeholder for a logical id's attribute
///
/// Depends only on its inputs, so the same stack always resolves to the
/// same strings.
pub fn resolved_identifier(logical_id: &str, attribute: Attribute) -> String {
    match attribute {
        Attribute::Ref => format!("${{{logical_id}}}"),
        Attribute::Arn => format!("${{{logical_id}.Arn}}"),
    }
}

/// A property value on a declaration
///
/// Literals are plain JSON. [`PropertyValue::Ref`] is the reference marker
/// the resolver replaces; lists and maps may nest references anywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Literal(serde_json::Value),
    Ref(Reference),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Reference marker pointing at a target's primary identifier
    pub fn reference(target: impl Into<String>) -> Self {
        Self::Ref(Reference::to(target))
    }

    /// Reference marker pointing at a target's ARN
    pub fn arn(target: impl Into<String>) -> Self {
        Self::Ref(Reference::arn(target))
    }

    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<PropertyValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<PropertyValue>,
        I: IntoIterator<Item = V>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Every reference marker in this value, depth-first in key order
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Literal(_) => {}
            Self::Ref(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(out)),
        }
    }

    /// Whether no reference marker remains anywhere in this value
    pub fn is_resolved(&self) -> bool {
        self.references().is_empty()
    }

    /// Replace every reference marker with its resolved identifier
    pub fn resolve_with<F>(&self, f: &mut F) -> Result<Self>
    where
        F: FnMut(&Reference) -> Result<String>,
    {
        Ok(match self {
            Self::Literal(v) => Self::Literal(v.clone()),
            Self::Ref(r) => Self::Literal(serde_json::Value::String(f(r)?)),
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|v| v.resolve_with(f))
                    .collect::<Result<_>>()?,
            ),
            Self::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| -> Result<(String, Self)> {
                        Ok((k.clone(), v.resolve_with(f)?))
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Flatten into plain JSON, failing if a reference marker is left
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Literal(v) => v.clone(),
            Self::Ref(r) => {
                return Err(Error::synthesis(format!(
                    "reference to '{}' was not resolved",
                    r.target
                )));
            }
            Self::List(items) => serde_json::Value::Array(
                items.iter().map(Self::to_json).collect::<Result<_>>()?,
            ),
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| -> Result<(String, serde_json::Value)> {
                        Ok((k.clone(), v.to_json()?))
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Literal(value)
    }
}

impl From<Reference> for PropertyValue {
    fn from(reference: Reference) -> Self {
        Self::Ref(reference)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Literal(value.into())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Literal(value.into())
    }
}

impl From<&String> for PropertyValue {
    fn from(value: &String) -> Self {
        Self::Literal(value.as_str().into())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Literal(value.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        Self::Literal(value.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Literal(value.into())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Literal(value.into())
    }
}

/// A dependency between two declarations
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub relation: Relation,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, relation: Relation) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation,
        }
    }
}

/// What happens to a resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolved_identifier_is_stable() {
        assert_eq!(resolved_identifier("LogGroup", Attribute::Ref), "${LogGroup}");
        assert_eq!(resolved_identifier("Lambda", Attribute::Arn), "${Lambda.Arn}");
        assert_eq!(
            Reference::arn("Lambda").resolved(),
            Reference::arn("Lambda").resolved()
        );
    }

    #[test]
    fn test_references_found_in_nested_values() {
        let value = PropertyValue::map([
            ("A", PropertyValue::reference("X")),
            (
                "B",
                PropertyValue::list([PropertyValue::from("lit"), PropertyValue::arn("Y")]),
            ),
        ]);
        let targets: Vec<&str> = value.references().iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["X", "Y"]);
        assert!(!value.is_resolved());
    }

    #[test]
    fn test_to_json_rejects_markers() {
        let value = PropertyValue::map([("Target", PropertyValue::reference("F"))]);
        assert!(matches!(value.to_json(), Err(Error::Synthesis { .. })));
    }

    #[test]
    fn test_resolve_then_flatten() {
        let value = PropertyValue::map([
            ("Name", PropertyValue::from("n")),
            ("Target", PropertyValue::arn("F")),
        ]);
        let resolved = value.resolve_with(&mut |r: &Reference| Ok(r.resolved())).unwrap();
        assert!(resolved.is_resolved());
        assert_eq!(
            resolved.to_json().unwrap(),
            json!({"Name": "n", "Target": "${F.Arn}"})
        );
    }

    #[test]
    fn test_kind_round_trips_type_name() {
        for kind in ResourceKind::ALL {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.type_name()));
            assert_eq!(ResourceKind::parse(kind.type_name()), Some(kind));
        }
    }

    #[test]
    fn test_identity_provider_accepts_both_spellings() {
        let legacy: ResourceKind =
            serde_json::from_value(json!("Custom::AWSCDKOpenIdConnectProvider")).unwrap();
        assert_eq!(legacy, ResourceKind::IdentityProvider);
        assert_eq!(ResourceKind::parse("oidc"), Some(ResourceKind::IdentityProvider));
    }
}
