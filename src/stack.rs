//! The game price notifier stack
//!
//! A log group, a scheduled function writing to it, and a role that lets
//! the repository's CI pipeline update the function's code through the
//! CI identity provider.

use crate::config::StackConfig;
use declarative::{
    Architecture, AssertionQuery, Conditions, CronSchedule, Function, LogGroup, LoggingFormat,
    OidcProvider, Policy, Principal, RemovalPolicy, ResourceKind, RetentionDays, Role, Runtime,
    Schedule, ScheduleRule, Stack, Statement,
};
use serde_json::json;
use std::time::Duration;

pub const STACK_NAME: &str = "NotifierStack";

pub const LOG_GROUP_NAME: &str = "steam-game-prices-notifier-log-group";
pub const FUNCTION_NAME: &str = "steam-game-prices-notifier-lambda";
pub const RULE_NAME: &str = "steam-game-prices-notifier-rule";
pub const ROLE_NAME: &str = "steam-game-prices-notifier-github-actions-role";

pub const TOKEN_ISSUER: &str = "token.actions.githubusercontent.com";
pub const AUDIENCE: &str = "sts.amazonaws.com";
pub const REPOSITORY_SUBJECT: &str = "repo:TsubasaBneAus/steam_game_prices_notifier:*";

const BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Declare every resource of the notifier
pub fn notifier_stack(config: &StackConfig) -> declarative::Result<Stack> {
    let mut stack = Stack::new(STACK_NAME);

    stack
        .add(
            LogGroup::new("LogGroup")
                .name(LOG_GROUP_NAME)
                .retention(RetentionDays::OneWeek)
                .removal_policy(RemovalPolicy::Destroy),
        )?
        .add(
            Role::new(
                "LambdaServiceRole",
                Principal::Service("lambda.amazonaws.com".into()),
            )
            .managed_policy(BASIC_EXECUTION_POLICY),
        )?
        .add(
            Function::new("Lambda", &config.asset, Runtime::ProvidedAl2023, "bootstrap")
                .name(FUNCTION_NAME)
                .architecture(Architecture::Arm64)
                .environment(config.env.clone())
                .timeout(Duration::from_secs(2 * 60))
                .log_group("LogGroup")
                .logging_format(LoggingFormat::Json)
                .role("LambdaServiceRole"),
        )?;

    // 09:00 UTC every day
    let daily = CronSchedule::default()
        .minute("0")
        .hour("9")
        .day("*")
        .month("*")
        .year("*");
    stack.add(
        ScheduleRule::new("Rule", Schedule::Cron(daily))
            .name(RULE_NAME)
            .target("Lambda"),
    )?;

    stack
        .add(OidcProvider::new("OIDCProvider", format!("https://{TOKEN_ISSUER}")).client_id(AUDIENCE))?
        .add(
            Role::new(
                "Role",
                Principal::WebIdentity {
                    provider: "OIDCProvider".into(),
                    conditions: Conditions::new()
                        .string_equals(format!("{TOKEN_ISSUER}:aud"), AUDIENCE)
                        .string_like(format!("{TOKEN_ISSUER}:sub"), REPOSITORY_SUBJECT),
                },
            )
            .name(ROLE_NAME),
        )?
        .add(
            Policy::new("RoleDefaultPolicy")
                .attach_to("Role")
                .statement(
                    Statement::allow()
                        .action("lambda:UpdateFunctionCode")
                        .resource_arn_of("Lambda"),
                ),
        )?;

    Ok(stack)
}

/// Structural checks the synthesized notifier must satisfy
pub fn suite() -> Vec<AssertionQuery> {
    let function = |check: &str, props: serde_json::Value| {
        let mut expected = json!({"FunctionName": FUNCTION_NAME});
        if let (Some(base), serde_json::Value::Object(extra)) = (expected.as_object_mut(), props) {
            base.extend(extra);
        }
        AssertionQuery::new(ResourceKind::Function)
            .named(check)
            .expect(expected)
    };

    vec![
        AssertionQuery::new(ResourceKind::LogSink)
            .named("1 log group exists")
            .expect(json!({"LogGroupName": LOG_GROUP_NAME}))
            .count(1),
        AssertionQuery::new(ResourceKind::LogSink)
            .named("log group keeps events for 1 week")
            .expect(json!({"LogGroupName": LOG_GROUP_NAME, "RetentionInDays": 7})),
        AssertionQuery::new(ResourceKind::Function)
            .named("1 function exists")
            .expect(json!({"FunctionName": FUNCTION_NAME}))
            .count(1),
        function("function runs on arm64", json!({"Architectures": ["arm64"]})),
        function("function runtime is provided.al2023", json!({"Runtime": "provided.al2023"})),
        function("function handler is bootstrap", json!({"Handler": "bootstrap"})),
        function("function timeout is 2 minutes", json!({"Timeout": 120})),
        function(
            "function logs as JSON",
            json!({"LoggingConfig": {"LogFormat": "JSON"}}),
        ),
        AssertionQuery::new(ResourceKind::ScheduleRule)
            .named("1 schedule rule exists")
            .expect(json!({"Name": RULE_NAME}))
            .count(1),
        AssertionQuery::new(ResourceKind::ScheduleRule)
            .named("rule fires at 09:00 UTC daily")
            .expect(json!({"Name": RULE_NAME, "ScheduleExpression": "cron(0 9 * * ? *)"})),
        AssertionQuery::new(ResourceKind::IdentityProvider)
            .named("1 identity provider exists")
            .count(1),
        AssertionQuery::new(ResourceKind::IdentityProvider)
            .named("identity provider trusts the CI token issuer")
            .expect(json!({"Url": format!("https://{TOKEN_ISSUER}")})),
        AssertionQuery::new(ResourceKind::IdentityProvider)
            .named("identity provider audience is sts")
            .expect(json!({"ClientIDList": [AUDIENCE]})),
        AssertionQuery::new(ResourceKind::Role)
            .named("1 CI role exists")
            .expect(json!({"RoleName": ROLE_NAME}))
            .count(1),
        AssertionQuery::new(ResourceKind::Role)
            .named("CI role is limited to the repository")
            .expect(json!({
                "RoleName": ROLE_NAME,
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Condition": {
                            "StringEquals": {format!("{TOKEN_ISSUER}:aud"): AUDIENCE},
                            "StringLike": {format!("{TOKEN_ISSUER}:sub"): REPOSITORY_SUBJECT}
                        }
                    }]
                }
            })),
    ]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{AssertionFailure, PathChange, Template};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs;

    fn config() -> StackConfig {
        let values = BTreeMap::from([
            ("NOTION_API_KEY", "notion-key"),
            ("DISCORD_WEBHOOK_ID", "1234"),
        ]);
        StackConfig::from_lookup(|k| values.get(k).map(ToString::to_string), "../function.zip")
    }

    fn template() -> Template {
        notifier_stack(&config()).unwrap().template().unwrap()
    }

    #[test]
    fn test_structural_suite_passes() {
        let report = template().evaluate_all(&suite());
        let failures: Vec<String> = report
            .failures()
            .map(|o| format!("{}: {:?}", o.name, o.result))
            .collect();
        assert!(failures.is_empty(), "{failures:#?}");
        assert_eq!(report.passed(), suite().len());
    }

    #[test]
    fn test_synthesis_order() {
        let doc = notifier_stack(&config()).unwrap().synthesize().unwrap();
        let ids: Vec<&str> = doc.resources().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![
                "LambdaServiceRole",
                "LogGroup",
                "Lambda",
                "OIDCProvider",
                "Role",
                "RoleDefaultPolicy",
                "Rule",
            ]
        );
    }

    #[test]
    fn test_dependencies_are_recorded() {
        let template = template();
        let doc = template.document();
        assert_eq!(
            doc.get("Lambda").unwrap().depends_on,
            vec!["LambdaServiceRole", "LogGroup"]
        );
        assert_eq!(doc.get("Rule").unwrap().depends_on, vec!["Lambda"]);
        assert_eq!(doc.get("Role").unwrap().depends_on, vec!["OIDCProvider"]);
        assert_eq!(
            doc.get("RoleDefaultPolicy").unwrap().depends_on,
            vec!["Lambda", "Role"]
        );
    }

    #[test]
    fn test_function_environment_and_references() {
        let template = template();
        let lambda = template.document().get("Lambda").unwrap();
        assert_eq!(
            lambda.properties["Environment"]["Variables"],
            json!({
                "DISCORD_WEBHOOK_ID": "1234",
                "DISCORD_WEBHOOK_TOKEN": "",
                "NOTION_API_KEY": "notion-key",
                "NOTION_DATABASE_ID": "",
                "STEAM_USER_ID": ""
            })
        );
        assert_eq!(lambda.properties["Code"], json!({"AssetPath": "../function.zip"}));
        assert_eq!(lambda.properties["Role"], json!("${LambdaServiceRole.Arn}"));
        assert_eq!(lambda.properties["LoggingConfig"]["LogGroup"], json!("${LogGroup}"));
    }

    #[test]
    fn test_log_group_is_destroyed_with_the_stack() {
        let template = template();
        let log_group = template.document().get("LogGroup").unwrap();
        assert_eq!(log_group.deletion_policy, Some(declarative::DeletionPolicy::Delete));
    }

    #[test]
    fn test_ci_policy_targets_the_function() {
        let template = template();
        assert!(template
            .has_resource_properties(
                ResourceKind::PolicyStatement,
                json!({
                    "PolicyDocument": {
                        "Statement": [{
                            "Action": "lambda:UpdateFunctionCode",
                            "Effect": "Allow",
                            "Resource": "${Lambda.Arn}"
                        }]
                    },
                    "Roles": ["${Role}"]
                })
            )
            .is_ok());
    }

    /// Just the identity provider and CI role, with the given trust values
    fn ci_role_template(audience: &str, subject: &str) -> Template {
        let mut stack = Stack::new(STACK_NAME);
        stack
            .add(OidcProvider::new("OIDCProvider", format!("https://{TOKEN_ISSUER}")))
            .unwrap()
            .add(
                Role::new(
                    "Role",
                    Principal::WebIdentity {
                        provider: "OIDCProvider".into(),
                        conditions: Conditions::new()
                            .string_equals(format!("{TOKEN_ISSUER}:aud"), audience)
                            .string_like(format!("{TOKEN_ISSUER}:sub"), subject),
                    },
                )
                .name(ROLE_NAME),
            )
            .unwrap();
        stack.template().unwrap()
    }

    fn trust_check() -> AssertionQuery {
        suite()
            .into_iter()
            .find(|q| q.name.as_deref() == Some("CI role is limited to the repository"))
            .unwrap()
    }

    #[test]
    fn test_trust_conditions_match_declared_values() {
        let template = ci_role_template(AUDIENCE, REPOSITORY_SUBJECT);
        assert_eq!(template.evaluate(&trust_check()), Ok(()));
    }

    #[test]
    fn test_wrong_audience_fails_the_condition_check() {
        let template = ci_role_template("example.com", REPOSITORY_SUBJECT);
        match template.evaluate(&trust_check()) {
            Err(AssertionFailure::NoMatch {
                candidates, closest, ..
            }) => {
                assert_eq!(candidates, 1);
                assert!(closest.unwrap().contains(":aud"));
            }
            other => panic!("expected no match, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_subject_fails_the_condition_check() {
        let template = ci_role_template(AUDIENCE, "repo:someone/else:*");
        match template.evaluate(&trust_check()) {
            Err(AssertionFailure::NoMatch { closest, .. }) => {
                assert!(closest.unwrap().contains(":sub"));
            }
            other => panic!("expected no match, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{STACK_NAME}.template.json"));
        fs::write(&path, template().to_snapshot().unwrap()).unwrap();

        let stored = fs::read_to_string(&path).unwrap();
        assert_eq!(template().match_snapshot(&stored), Ok(()));
    }

    #[test]
    fn test_snapshot_reports_the_changed_property() {
        let stored = template().to_snapshot().unwrap();

        let mut changed = config();
        changed
            .env
            .insert("STEAM_USER_ID".to_string(), "76561198000000000".to_string());
        let current = notifier_stack(&changed).unwrap().template().unwrap();

        match current.match_snapshot(&stored) {
            Err(AssertionFailure::SnapshotMismatch { changes }) => assert_eq!(
                changes,
                vec![PathChange::Changed {
                    path: "Resources.Lambda.Properties.Environment.Variables.STEAM_USER_ID".into(),
                    before: json!(""),
                    after: json!("76561198000000000"),
                }]
            ),
            other => panic!("expected snapshot mismatch, got {other:?}"),
        }
    }
}
