//! Policies, rules and tasks, plus the pure matching functions evaluated on them.
//!
//! Matching is permissive-by-omission: a DENY or UNSPECIFIED rule never
//! matches, and "no matching rule" is turned into a denial one layer up by
//! [`crate::policy::PolicyEvaluator`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A (caller app, optional tool) pair governed by a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub app_id: String,
    /// Empty means every tool of the app.
    pub tool_name: String,
}

impl Task {
    /// App ids compare exactly; tool names compare case-insensitively.
    pub fn matches(&self, app_id: &str, tool_name: &str) -> bool {
        self.app_id == app_id
            && (self.tool_name.is_empty() || tool_names_equal(&self.tool_name, tool_name))
    }
}

fn tool_names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleAction {
    #[default]
    Unspecified,
    Allow,
    Deny,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "RULE_ACTION_UNSPECIFIED",
            Self::Allow => "RULE_ACTION_ALLOW",
            Self::Deny => "RULE_ACTION_DENY",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = std::convert::Infallible;

    /// Accepts `ALLOW`/`DENY` and the long `RULE_ACTION_*` forms in any case.
    /// Anything else parses as `Unspecified`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("RULE_ACTION_").unwrap_or(&upper);
        Ok(match short {
            "ALLOW" => Self::Allow,
            "DENY" => Self::Deny,
            _ => Self::Unspecified,
        })
    }
}

impl From<String> for RuleAction {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl From<RuleAction> for String {
    fn from(a: RuleAction) -> Self {
        a.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub policy_id: String,
    pub tasks: Vec<Task>,
    pub action: RuleAction,
    /// A matching rule with this flag only permits the call after device approval.
    pub needs_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Rule {
    /// True iff the rule is an ALLOW rule and any of its tasks matches.
    pub fn can_invoke(&self, app_id: &str, tool_name: &str) -> bool {
        self.action == RuleAction::Allow
            && self.tasks.iter().any(|task| task.matches(app_id, tool_name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub assigned_to: String,
    pub rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Policy {
    /// First rule (in insertion order) that allows the call, if any.
    pub fn can_invoke(&self, app_id: &str, tool_name: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.can_invoke(app_id, tool_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(app_id: &str, tool_name: &str) -> Task {
        Task {
            app_id: app_id.into(),
            tool_name: tool_name.into(),
            ..Default::default()
        }
    }

    fn rule(id: &str, action: RuleAction, tasks: Vec<Task>) -> Rule {
        Rule {
            id: id.into(),
            action,
            tasks,
            ..Default::default()
        }
    }

    #[test]
    fn rule_can_invoke_matching_task() {
        let r = rule("r1", RuleAction::Allow, vec![task("app_1", "tool_1")]);
        assert!(r.can_invoke("app_1", "tool_1"));
    }

    #[test]
    fn rule_rejects_other_app_even_when_tool_matches() {
        let r = rule("r1", RuleAction::Allow, vec![task("app_1", "tool_1")]);
        assert!(!r.can_invoke("app_2", "tool_1"));
    }

    #[test]
    fn rule_tool_match_ignores_case() {
        let r = rule("r1", RuleAction::Allow, vec![task("app_1", "tool_1")]);
        assert!(r.can_invoke("app_1", "Tool_1"));
        assert!(r.can_invoke("app_1", "TOOL_1"));
        assert!(!r.can_invoke("app_1", "tool_2"));
    }

    #[test]
    fn rule_app_match_is_exact() {
        let r = rule("r1", RuleAction::Allow, vec![task("app_1", "")]);
        assert!(!r.can_invoke("APP_1", ""));
    }

    #[test]
    fn task_without_tool_covers_every_tool() {
        let r = rule("r1", RuleAction::Allow, vec![task("app_1", "")]);
        assert!(r.can_invoke("app_1", ""));
        assert!(r.can_invoke("app_1", "anything"));
    }

    #[test]
    fn task_with_tool_does_not_match_empty_query() {
        let r = rule("r1", RuleAction::Allow, vec![task("app_1", "tool_1")]);
        assert!(!r.can_invoke("app_1", ""));
    }

    #[test]
    fn deny_and_unspecified_rules_never_match() {
        for action in [RuleAction::Deny, RuleAction::Unspecified] {
            let r = rule("r1", action, vec![task("app_1", "")]);
            assert!(!r.can_invoke("app_1", ""), "{action} must not match");
        }
    }

    #[test]
    fn rule_without_tasks_never_matches() {
        let r = rule("r1", RuleAction::Allow, vec![]);
        assert!(!r.can_invoke("app_1", ""));
    }

    #[test]
    fn policy_can_invoke_each_app() {
        let apps = ["app_1", "app_2", "app_3"];
        let policy = Policy {
            assigned_to: "assigned_to".into(),
            rules: apps
                .iter()
                .map(|a| rule(a, RuleAction::Allow, vec![task(a, "")]))
                .collect(),
            ..Default::default()
        };

        for app in apps {
            let found = policy.can_invoke(app, "").expect("rule for app");
            assert_eq!(found.id, app);
        }
    }

    #[test]
    fn policy_returns_none_when_nothing_matches() {
        let policy = Policy {
            rules: vec![rule("r1", RuleAction::Allow, vec![task("app", "")])],
            ..Default::default()
        };
        assert!(policy.can_invoke("invalid_app", "").is_none());
        assert!(Policy::default().can_invoke("app", "").is_none());
    }

    #[test]
    fn policy_returns_first_matching_rule() {
        let policy = Policy {
            rules: vec![
                rule("deny", RuleAction::Deny, vec![task("app", "")]),
                rule("first", RuleAction::Allow, vec![task("app", "")]),
                rule("second", RuleAction::Allow, vec![task("app", "tool")]),
            ],
            ..Default::default()
        };
        assert_eq!(policy.can_invoke("app", "tool").unwrap().id, "first");
    }

    #[test]
    fn rule_action_parsing() {
        assert_eq!("ALLOW".parse::<RuleAction>().unwrap(), RuleAction::Allow);
        assert_eq!(
            "RULE_ACTION_DENY".parse::<RuleAction>().unwrap(),
            RuleAction::Deny
        );
        assert_eq!("allow".parse::<RuleAction>().unwrap(), RuleAction::Allow);
        assert_eq!(
            "bogus".parse::<RuleAction>().unwrap(),
            RuleAction::Unspecified
        );
    }

    #[test]
    fn rule_deserializes_from_yaml() {
        let yaml = r#"
id: r1
action: ALLOW
needs_approval: true
tasks:
  - app_id: app_1
    tool_name: search
"#;
        let r: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(r.action, RuleAction::Allow);
        assert!(r.needs_approval);
        assert!(r.can_invoke("app_1", "SEARCH"));
    }
}
