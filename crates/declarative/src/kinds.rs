//! Typed builders, one per resource kind
//!
//! Each builder owns the structured values for its kind (retention periods,
//! cron schedules, trust conditions) and lays them out as template
//! properties when lowered. Cross-references are plain logical ids; the
//! resolver turns them into edges later.

use crate::error::{Error, Result};
use crate::resource::{Declaration, Resource};
use crate::types::{DeletionPolicy, PropertyValue, Reference, ResourceKind};
use std::collections::BTreeMap;
use std::time::Duration;

const POLICY_VERSION: &str = "2012-10-17";

fn invalid(logical_id: &str, message: impl Into<String>) -> Error {
    Error::InvalidProperty {
        logical_id: logical_id.to_string(),
        message: message.into(),
    }
}

/// Collapse single-element lists to a scalar, the way policy documents
/// are usually written
fn one_or_many(mut values: Vec<PropertyValue>) -> PropertyValue {
    if values.len() == 1 {
        values.remove(0)
    } else {
        PropertyValue::List(values)
    }
}

// ============================================================================
// Log sink
// ============================================================================

/// How long a log group keeps its events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDays {
    OneDay,
    ThreeDays,
    FiveDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl RetentionDays {
    pub fn days(&self) -> u32 {
        match self {
            Self::OneDay => 1,
            Self::ThreeDays => 3,
            Self::FiveDays => 5,
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
        }
    }
}

/// What to do with a resource once it is removed from the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
    Snapshot,
}

impl From<RemovalPolicy> for DeletionPolicy {
    fn from(policy: RemovalPolicy) -> Self {
        match policy {
            RemovalPolicy::Destroy => DeletionPolicy::Delete,
            RemovalPolicy::Retain => DeletionPolicy::Retain,
            RemovalPolicy::Snapshot => DeletionPolicy::Snapshot,
        }
    }
}

/// A log group (kind: LogSink)
#[derive(Debug, Clone)]
pub struct LogGroup {
    pub logical_id: String,
    pub log_group_name: Option<String>,
    pub retention: Option<RetentionDays>,
    pub removal_policy: Option<RemovalPolicy>,
}

impl LogGroup {
    pub fn new(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            log_group_name: None,
            retention: None,
            removal_policy: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.log_group_name = Some(name.into());
        self
    }

    pub fn retention(mut self, retention: RetentionDays) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }
}

impl Resource for LogGroup {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::LogSink
    }

    fn to_declaration(&self) -> Result<Declaration> {
        let mut decl = Declaration::new(&self.logical_id, ResourceKind::LogSink)
            .property_opt("LogGroupName", self.log_group_name.as_ref())
            .property_opt("RetentionInDays", self.retention.map(|r| r.days()));
        if let Some(policy) = self.removal_policy {
            decl = decl.deletion_policy(policy.into());
        }
        Ok(decl)
    }
}

// ============================================================================
// Function
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Arm64,
    X86_64,
}

impl Architecture {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runtime {
    ProvidedAl2023,
    ProvidedAl2,
    /// Any other runtime identifier, passed through verbatim
    Other(String),
}

impl Runtime {
    pub fn name(&self) -> &str {
        match self {
            Self::ProvidedAl2023 => "provided.al2023",
            Self::ProvidedAl2 => "provided.al2",
            Self::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingFormat {
    Json,
    Text,
}

impl LoggingFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Text => "Text",
        }
    }
}

/// A compute function (kind: Function)
///
/// `code` is an opaque reference to the packaged artifact; environment
/// values are opaque strings and may be empty.
#[derive(Debug, Clone)]
pub struct Function {
    pub logical_id: String,
    pub function_name: Option<String>,
    pub code: String,
    pub architecture: Architecture,
    pub runtime: Runtime,
    pub handler: String,
    pub environment: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub log_group: Option<String>,
    pub logging_format: Option<LoggingFormat>,
    pub role: Option<String>,
}

impl Function {
    pub fn new(
        logical_id: impl Into<String>,
        code: impl Into<String>,
        runtime: Runtime,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            function_name: None,
            code: code.into(),
            architecture: Architecture::X86_64,
            runtime,
            handler: handler.into(),
            environment: BTreeMap::new(),
            timeout: None,
            log_group: None,
            logging_format: None,
            role: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    pub fn architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn environment(mut self, vars: BTreeMap<String, String>) -> Self {
        self.environment.extend(vars);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send logs to the log group with this logical id
    pub fn log_group(mut self, logical_id: impl Into<String>) -> Self {
        self.log_group = Some(logical_id.into());
        self
    }

    pub fn logging_format(mut self, format: LoggingFormat) -> Self {
        self.logging_format = Some(format);
        self
    }

    /// Run as the role with this logical id
    pub fn role(mut self, logical_id: impl Into<String>) -> Self {
        self.role = Some(logical_id.into());
        self
    }
}

impl Resource for Function {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Function
    }

    fn to_declaration(&self) -> Result<Declaration> {
        if self.handler.is_empty() {
            return Err(invalid(&self.logical_id, "handler must not be empty"));
        }

        let timeout = match self.timeout {
            Some(t) if t.subsec_nanos() != 0 => {
                return Err(invalid(
                    &self.logical_id,
                    format!("timeout must be whole seconds, got {t:?}"),
                ));
            }
            Some(t) if t.as_secs() == 0 => {
                return Err(invalid(&self.logical_id, "timeout must be at least one second"));
            }
            Some(t) => Some(t.as_secs()),
            None => None,
        };

        let mut logging: BTreeMap<String, PropertyValue> = BTreeMap::new();
        if let Some(format) = self.logging_format {
            logging.insert("LogFormat".into(), format.name().into());
        }
        if let Some(group) = &self.log_group {
            logging.insert("LogGroup".into(), PropertyValue::reference(group));
        }

        let mut decl = Declaration::new(&self.logical_id, ResourceKind::Function)
            .property_opt("FunctionName", self.function_name.as_ref())
            .property("Code", PropertyValue::map([("AssetPath", &self.code)]))
            .property("Architectures", PropertyValue::list([self.architecture.name()]))
            .property("Runtime", self.runtime.name())
            .property("Handler", &self.handler)
            .property_opt("Timeout", timeout)
            .property_opt("Role", self.role.as_ref().map(Reference::arn));

        if !self.environment.is_empty() {
            decl = decl.property(
                "Environment",
                PropertyValue::map([(
                    "Variables",
                    PropertyValue::map(self.environment.iter().map(|(k, v)| (k.as_str(), v))),
                )]),
            );
        }
        if !logging.is_empty() {
            decl = decl.property("LoggingConfig", PropertyValue::Map(logging));
        }
        Ok(decl)
    }
}

// ============================================================================
// Schedule rule
// ============================================================================

/// Structured cron fields; unset fields fall back to wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CronSchedule {
    pub minute: Option<String>,
    pub hour: Option<String>,
    pub day: Option<String>,
    pub month: Option<String>,
    pub week_day: Option<String>,
    pub year: Option<String>,
}

impl CronSchedule {
    pub fn minute(mut self, v: impl Into<String>) -> Self {
        self.minute = Some(v.into());
        self
    }

    pub fn hour(mut self, v: impl Into<String>) -> Self {
        self.hour = Some(v.into());
        self
    }

    pub fn day(mut self, v: impl Into<String>) -> Self {
        self.day = Some(v.into());
        self
    }

    pub fn month(mut self, v: impl Into<String>) -> Self {
        self.month = Some(v.into());
        self
    }

    pub fn week_day(mut self, v: impl Into<String>) -> Self {
        self.week_day = Some(v.into());
        self
    }

    pub fn year(mut self, v: impl Into<String>) -> Self {
        self.year = Some(v.into());
        self
    }

    /// Render as `cron(min hour day month week-day year)`
    ///
    /// Day and week-day are mutually exclusive: the one not given becomes `?`.
    pub fn expression(&self) -> std::result::Result<String, String> {
        let (day, week_day) = match (&self.day, &self.week_day) {
            (Some(_), Some(_)) => {
                return Err("cannot supply both 'day' and 'week_day'".to_string());
            }
            (Some(d), None) => (d.as_str(), "?"),
            (None, Some(w)) => ("?", w.as_str()),
            (None, None) => ("*", "?"),
        };
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "*".to_string());
        Ok(format!(
            "cron({} {} {} {} {} {})",
            field(&self.minute),
            field(&self.hour),
            day,
            field(&self.month),
            week_day,
            field(&self.year)
        ))
    }
}

/// When a schedule rule fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Cron(CronSchedule),
    /// Fixed interval, whole minutes only
    Rate(Duration),
    /// A raw schedule expression, passed through verbatim
    Expression(String),
}

impl Schedule {
    pub fn expression(&self) -> std::result::Result<String, String> {
        match self {
            Self::Cron(cron) => cron.expression(),
            Self::Rate(interval) => rate_expression(*interval),
            Self::Expression(expr) if expr.trim().is_empty() => {
                Err("schedule expression must not be empty".to_string())
            }
            Self::Expression(expr) => Ok(expr.clone()),
        }
    }
}

fn rate_expression(interval: Duration) -> std::result::Result<String, String> {
    let secs = interval.as_secs();
    if interval.subsec_nanos() != 0 || secs % 60 != 0 || secs == 0 {
        return Err(format!("rate must be a positive number of whole minutes, got {interval:?}"));
    }
    let minutes = secs / 60;
    let (amount, unit) = if minutes % 1440 == 0 {
        (minutes / 1440, "day")
    } else if minutes % 60 == 0 {
        (minutes / 60, "hour")
    } else {
        (minutes, "minute")
    };
    let plural = if amount == 1 { "" } else { "s" };
    Ok(format!("rate({amount} {unit}{plural})"))
}

/// A scheduled trigger (kind: ScheduleRule)
#[derive(Debug, Clone)]
pub struct ScheduleRule {
    pub logical_id: String,
    pub rule_name: Option<String>,
    pub schedule: Schedule,
    pub targets: Vec<String>,
    pub enabled: bool,
}

impl ScheduleRule {
    pub fn new(logical_id: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            logical_id: logical_id.into(),
            rule_name: None,
            schedule,
            targets: Vec::new(),
            enabled: true,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.rule_name = Some(name.into());
        self
    }

    /// Invoke the function with this logical id when the rule fires
    pub fn target(mut self, logical_id: impl Into<String>) -> Self {
        self.targets.push(logical_id.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Resource for ScheduleRule {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::ScheduleRule
    }

    fn to_declaration(&self) -> Result<Declaration> {
        let expression = self
            .schedule
            .expression()
            .map_err(|message| invalid(&self.logical_id, message))?;

        let mut decl = Declaration::new(&self.logical_id, ResourceKind::ScheduleRule)
            .property_opt("Name", self.rule_name.as_ref())
            .property("ScheduleExpression", expression)
            .property("State", if self.enabled { "ENABLED" } else { "DISABLED" });

        if !self.targets.is_empty() {
            let targets = self.targets.iter().enumerate().map(|(i, target)| {
                PropertyValue::map([
                    ("Arn", PropertyValue::Ref(Reference::arn(target).as_target())),
                    ("Id", PropertyValue::from(format!("Target{i}"))),
                ])
            });
            decl = decl.property("Targets", PropertyValue::list(targets));
        }
        Ok(decl)
    }
}

// ============================================================================
// Identity provider
// ============================================================================

/// A federated (OIDC) identity provider (kind: IdentityProvider)
#[derive(Debug, Clone)]
pub struct OidcProvider {
    pub logical_id: String,
    pub url: String,
    pub client_ids: Vec<String>,
    pub thumbprints: Vec<String>,
}

impl OidcProvider {
    pub fn new(logical_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            url: url.into(),
            client_ids: Vec::new(),
            thumbprints: Vec::new(),
        }
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_ids.push(client_id.into());
        self
    }

    pub fn thumbprint(mut self, thumbprint: impl Into<String>) -> Self {
        self.thumbprints.push(thumbprint.into());
        self
    }
}

impl Resource for OidcProvider {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::IdentityProvider
    }

    fn to_declaration(&self) -> Result<Declaration> {
        if !self.url.starts_with("https://") {
            return Err(invalid(&self.logical_id, "provider URL must use https://"));
        }
        let mut decl = Declaration::new(&self.logical_id, ResourceKind::IdentityProvider)
            .property("Url", &self.url)
            .property("ClientIDList", PropertyValue::list(&self.client_ids));
        if !self.thumbprints.is_empty() {
            decl = decl.property("ThumbprintList", PropertyValue::list(&self.thumbprints));
        }
        Ok(decl)
    }
}

// ============================================================================
// Role
// ============================================================================

/// Trust conditions, grouped by operator (`StringEquals`, `StringLike`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(BTreeMap<String, BTreeMap<String, String>>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.0
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn string_equals(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add("StringEquals", key, value)
    }

    pub fn string_like(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add("StringLike", key, value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::map(self.0.iter().map(|(op, pairs)| {
            (
                op.as_str(),
                PropertyValue::map(pairs.iter().map(|(k, v)| (k.as_str(), v))),
            )
        }))
    }
}

/// Who may assume a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A provider service, e.g. `lambda.amazonaws.com`
    Service(String),
    /// Tokens issued by the identity provider with this logical id
    WebIdentity {
        provider: String,
        conditions: Conditions,
    },
}

impl Principal {
    fn statement(&self) -> PropertyValue {
        match self {
            Self::Service(service) => PropertyValue::map([
                ("Action", PropertyValue::from("sts:AssumeRole")),
                ("Effect", PropertyValue::from("Allow")),
                ("Principal", PropertyValue::map([("Service", service)])),
            ]),
            Self::WebIdentity {
                provider,
                conditions,
            } => {
                let mut statement = BTreeMap::from([
                    (
                        "Action".to_string(),
                        PropertyValue::from("sts:AssumeRoleWithWebIdentity"),
                    ),
                    ("Effect".to_string(), PropertyValue::from("Allow")),
                    (
                        "Principal".to_string(),
                        PropertyValue::map([("Federated", PropertyValue::reference(provider))]),
                    ),
                ]);
                if !conditions.is_empty() {
                    statement.insert("Condition".to_string(), conditions.to_property());
                }
                PropertyValue::Map(statement)
            }
        }
    }
}

/// An identity role (kind: Role)
#[derive(Debug, Clone)]
pub struct Role {
    pub logical_id: String,
    pub role_name: Option<String>,
    pub assumed_by: Principal,
    pub description: Option<String>,
    pub managed_policy_arns: Vec<String>,
}

impl Role {
    pub fn new(logical_id: impl Into<String>, assumed_by: Principal) -> Self {
        Self {
            logical_id: logical_id.into(),
            role_name: None,
            assumed_by,
            description: None,
            managed_policy_arns: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.role_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn managed_policy(mut self, arn: impl Into<String>) -> Self {
        self.managed_policy_arns.push(arn.into());
        self
    }
}

impl Resource for Role {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Role
    }

    fn to_declaration(&self) -> Result<Declaration> {
        let document = PropertyValue::map([
            ("Statement", PropertyValue::list([self.assumed_by.statement()])),
            ("Version", PropertyValue::from(POLICY_VERSION)),
        ]);
        let mut decl = Declaration::new(&self.logical_id, ResourceKind::Role)
            .property_opt("RoleName", self.role_name.as_ref())
            .property_opt("Description", self.description.as_ref())
            .property("AssumeRolePolicyDocument", document);
        if !self.managed_policy_arns.is_empty() {
            decl = decl.property(
                "ManagedPolicyArns",
                PropertyValue::list(&self.managed_policy_arns),
            );
        }
        Ok(decl)
    }
}

// ============================================================================
// Policy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        }
    }
}

/// One permission statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<PropertyValue>,
}

impl Statement {
    pub fn allow() -> Self {
        Self {
            effect: Effect::Allow,
            actions: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn deny() -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::allow()
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Grant on a literal resource pattern such as `*`
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(PropertyValue::from(resource.into()));
        self
    }

    /// Grant on the ARN of the declaration with this logical id
    pub fn resource_arn_of(mut self, logical_id: impl Into<String>) -> Self {
        self.resources.push(PropertyValue::arn(logical_id));
        self
    }

    fn to_property(&self) -> PropertyValue {
        PropertyValue::map([
            (
                "Action",
                one_or_many(self.actions.iter().map(PropertyValue::from).collect()),
            ),
            ("Effect", PropertyValue::from(self.effect.name())),
            ("Resource", one_or_many(self.resources.clone())),
        ])
    }
}

/// Permissions attached to one or more roles (kind: PolicyStatement)
#[derive(Debug, Clone)]
pub struct Policy {
    pub logical_id: String,
    pub policy_name: Option<String>,
    pub roles: Vec<String>,
    pub statements: Vec<Statement>,
}

impl Policy {
    pub fn new(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            policy_name: None,
            roles: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.policy_name = Some(name.into());
        self
    }

    /// Attach to the role with this logical id
    pub fn attach_to(mut self, logical_id: impl Into<String>) -> Self {
        self.roles.push(logical_id.into());
        self
    }

    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }
}

impl Resource for Policy {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::PolicyStatement
    }

    fn to_declaration(&self) -> Result<Declaration> {
        if self.statements.is_empty() {
            return Err(invalid(&self.logical_id, "policy has no statements"));
        }
        if let Some(empty) = self.statements.iter().find(|s| s.actions.is_empty()) {
            return Err(invalid(
                &self.logical_id,
                format!("statement with effect {} has no actions", empty.effect.name()),
            ));
        }
        if self.statements.iter().any(|s| s.resources.is_empty()) {
            return Err(invalid(&self.logical_id, "statement has no resources"));
        }
        if self.roles.is_empty() {
            return Err(invalid(&self.logical_id, "policy is not attached to any role"));
        }

        let document = PropertyValue::map([
            (
                "Statement",
                PropertyValue::list(self.statements.iter().map(Statement::to_property)),
            ),
            ("Version", PropertyValue::from(POLICY_VERSION)),
        ]);
        let name = self
            .policy_name
            .clone()
            .unwrap_or_else(|| self.logical_id.clone());

        Ok(Declaration::new(&self.logical_id, ResourceKind::PolicyStatement)
            .property("PolicyName", name)
            .property("PolicyDocument", document)
            .property(
                "Roles",
                PropertyValue::list(self.roles.iter().map(PropertyValue::reference)),
            ))
    }
}
