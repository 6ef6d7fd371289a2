use pricebot_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use super::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_messenger_credentials(&config));
            checks.push(check_public_url(&config));
            checks.push(check_nlp(&config));
            checks.push(check_market(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["messenger_credentials", "public_url", "nlp_entities", "price_provider"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if failed {
        CheckStatus::Fail
    } else if all_pass {
        CheckStatus::Pass
    } else {
        CheckStatus::Warn
    };
    let summary = match overall_status {
        CheckStatus::Pass => "doctor: all readiness checks passed",
        CheckStatus::Warn => "doctor: ready with warnings",
        _ => "doctor: one or more readiness checks failed",
    }
    .to_string();

    DoctorReport { overall_status, summary, checks }
}

fn check_messenger_credentials(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "messenger_credentials",
        status: CheckStatus::Pass,
        details: format!(
            "app secret, validation token and page access token present; send api at `{}`",
            config.messenger.graph_api_base_url
        ),
    }
}

fn check_public_url(config: &AppConfig) -> DoctorCheck {
    match config.server.public_url.as_deref() {
        Some(url) => DoctorCheck {
            name: "public_url",
            status: CheckStatus::Pass,
            details: format!("webhook callback expected at `{}/webhook`", url.trim_end_matches('/')),
        },
        None => DoctorCheck {
            name: "public_url",
            status: CheckStatus::Warn,
            details: "server.public_url is unset; the platform needs a public HTTPS callback"
                .to_string(),
        },
    }
}

fn check_nlp(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "nlp_entities",
        status: CheckStatus::Pass,
        details: format!(
            "reading `{}` and `{}` with confidence > {}",
            config.nlp.asset_entity, config.nlp.price_entity, config.nlp.confidence_threshold
        ),
    }
}

fn check_market(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "price_provider",
        status: CheckStatus::Pass,
        details: format!(
            "{} at `{}` (timeout {}s)",
            config.market.provider.as_str(),
            config.market.resolved_base_url(),
            config.market.timeout_secs
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
