use crate::cli::args::PolicyCheckArgs;
use crate::exit_codes::{DENIED, SUCCESS};
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;
use warden_core::{AppDirectory, AuthError, Catalog, Decision, PolicyEvaluator};

pub fn cmd_check(args: PolicyCheckArgs) -> anyhow::Result<i32> {
    let catalog = Arc::new(
        Catalog::load(&args.catalog)
            .with_context(|| format!("failed to load catalog {}", args.catalog.display()))?,
    );
    let callee = catalog
        .get_app(&args.callee)
        .with_context(|| format!("unknown callee app '{}'", args.callee))?;

    let evaluator = PolicyEvaluator::new(catalog);
    let (code, report) = match evaluator.decide(&callee, &args.caller, &args.tool) {
        Ok(decision) => (SUCCESS, allowed(&decision)),
        Err(e @ (AuthError::NoMatchingRule | AuthError::InvalidRequest { .. })) => (
            DENIED,
            json!({
                "allowed": false,
                "reason": e.reason_code(),
                "message": e.to_string(),
            }),
        ),
        Err(e) => return Err(e).context("policy evaluation failed"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if code == SUCCESS {
        println!(
            "ALLOW {} -> {}{} via rule '{}' (policy '{}'){}",
            args.caller,
            args.callee,
            tool_suffix(&args.tool),
            report["rule_id"].as_str().unwrap_or_default(),
            report["policy_id"].as_str().unwrap_or_default(),
            if report["needs_approval"] == json!(true) {
                ", device approval required"
            } else {
                ""
            },
        );
    } else {
        println!(
            "DENY {} -> {}{}: {}",
            args.caller,
            args.callee,
            tool_suffix(&args.tool),
            report["message"].as_str().unwrap_or_default(),
        );
    }
    Ok(code)
}

fn allowed(decision: &Decision) -> serde_json::Value {
    let rule = decision.rule();
    json!({
        "allowed": true,
        "rule_id": rule.id,
        "rule_name": rule.name,
        "policy_id": rule.policy_id,
        "needs_approval": decision.needs_approval(),
    })
}

fn tool_suffix(tool: &str) -> String {
    if tool.is_empty() {
        String::new()
    } else {
        format!(" [{tool}]")
    }
}
