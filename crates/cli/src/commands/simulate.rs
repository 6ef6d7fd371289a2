use std::fs;
use std::path::Path;

use pricebot_core::{
    config::{AppConfig, LoadOptions},
    Action, WebhookPayload,
};
use pricebot_messenger::{BatchPlan, BatchPlanner, EventContext};
use serde::Serialize;

use super::{CommandResult, escape_json};

#[derive(Debug, Serialize)]
struct SimulationReport<'a> {
    policy: &'static str,
    plan: &'a BatchPlan,
    yielded: usize,
    non_message: usize,
    malformed: usize,
    replies: Vec<ReplyPreview>,
}

#[derive(Debug, Serialize)]
struct ReplyPreview {
    recipient_id: String,
    text: String,
}

/// Runs normalization, extraction and dispatch only; nothing is sent.
pub fn run(file: &Path, json_output: bool) -> CommandResult {
    let raw = match fs::read(file) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "io",
                format!("could not read `{}`: {error}", file.display()),
                3,
            )
        }
    };
    let payload: WebhookPayload = match serde_json::from_slice(&raw) {
        Ok(payload) => payload,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "malformed_payload",
                format!("`{}` is not a webhook payload: {error}", file.display()),
                4,
            )
        }
    };

    // Credentials are irrelevant to planning, so fall back to defaults.
    let (planner, unsupported_text, policy) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (
            BatchPlanner::from_config(&config),
            config.dispatch.unsupported_attachment_text,
            "configured",
        ),
        Err(_) => (
            BatchPlanner::default(),
            AppConfig::default().dispatch.unsupported_attachment_text,
            "default",
        ),
    };

    let plan = planner.plan(&payload, &EventContext::new("simulate"));
    let replies = plan
        .actionable()
        .map(|planned| ReplyPreview {
            recipient_id: planned.sender_id.clone(),
            text: preview_text(planned.action, &unsupported_text),
        })
        .collect();
    let report = SimulationReport {
        policy,
        plan: &plan,
        yielded: plan.stats.yielded,
        non_message: plan.stats.non_message,
        malformed: plan.stats.malformed,
        replies,
    };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"simulate\",\"status\":\"error\",\"message\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code: 0, output }
}

fn preview_text(action: Action, unsupported_text: &str) -> String {
    match action {
        Action::None => String::new(),
        Action::SendAck(asset) => asset.ack_phrase().to_string(),
        Action::SendPriceReply(asset) => {
            format!("The price of {} is <live price> US Dollars", asset.price_symbol())
        }
        Action::SendUnsupportedAttachment => unsupported_text.to_string(),
    }
}

fn render_human(report: &SimulationReport<'_>) -> String {
    let mut lines = vec![format!(
        "simulate: {} message event(s), {} skipped, {} malformed ({} policy)",
        report.yielded, report.non_message, report.malformed, report.policy
    )];

    for planned in &report.plan.actions {
        lines.push(format!(
            "- entry {} event {} sender {}: {}",
            planned.entry_index,
            planned.event_index,
            planned.sender_id,
            planned.action.as_str()
        ));
    }
    for reply in &report.replies {
        lines.push(format!("  -> {}: {}", reply.recipient_id, reply.text));
    }

    lines.join("\n")
}
