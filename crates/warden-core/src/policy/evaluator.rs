use crate::errors::AuthError;
use crate::model::{App, Rule};
use crate::store::PolicySource;
use std::sync::Arc;

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Rule),
    /// Permitted only once a device approves the call.
    NeedsApproval(Rule),
}

impl Decision {
    pub fn rule(&self) -> &Rule {
        match self {
            Self::Allow(rule) | Self::NeedsApproval(rule) => rule,
        }
    }

    pub fn needs_approval(&self) -> bool {
        matches!(self, Self::NeedsApproval(_))
    }
}

impl From<Rule> for Decision {
    fn from(rule: Rule) -> Self {
        if rule.needs_approval {
            Self::NeedsApproval(rule)
        } else {
            Self::Allow(rule)
        }
    }
}

#[derive(Clone)]
pub struct PolicyEvaluator {
    policies: Arc<dyn PolicySource>,
}

impl PolicyEvaluator {
    pub fn new(policies: Arc<dyn PolicySource>) -> Self {
        Self { policies }
    }

    /// First rule, across every policy of `caller_app_id`, allowing a call
    /// to `callee` (and `tool_name` when the callee is an MCP server).
    pub fn evaluate(
        &self,
        callee: &App,
        caller_app_id: &str,
        tool_name: &str,
    ) -> Result<Rule, AuthError> {
        if callee.is_mcp_server() && tool_name.is_empty() {
            return Err(AuthError::invalid_request(
                "auth.emptyToolName",
                "tool name should not be empty for MCP servers",
            ));
        }

        let policies = self.policies.policies_for_app(caller_app_id)?;
        let rule = policies
            .iter()
            .find_map(|policy| policy.can_invoke(&callee.id, tool_name));

        match rule {
            Some(rule) => {
                tracing::debug!(
                    event = "policy.match",
                    caller = %caller_app_id,
                    callee = %callee.id,
                    rule_id = %rule.id,
                    needs_approval = rule.needs_approval,
                );
                Ok(rule.clone())
            }
            None => {
                tracing::info!(
                    event = "policy.deny",
                    caller = %caller_app_id,
                    callee = %callee.id,
                    tool = %tool_name,
                    reason = "no matching rule",
                );
                Err(AuthError::NoMatchingRule)
            }
        }
    }

    pub fn decide(
        &self,
        callee: &App,
        caller_app_id: &str,
        tool_name: &str,
    ) -> Result<Decision, AuthError> {
        self.evaluate(callee, caller_app_id, tool_name)
            .map(Decision::from)
    }
}
