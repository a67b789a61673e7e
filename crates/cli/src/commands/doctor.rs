use scholar_agent::{client_from_config, default_registry, CapabilityRegistry};
use scholar_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

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

pub fn build_report(loaded: Result<AppConfig, ConfigError>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_registry(&default_registry()));
            checks.push(check_completion_endpoint(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["capability_registry", "completion_endpoint"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_registry(registry: &CapabilityRegistry) -> DoctorCheck {
    let descriptors = registry.descriptors();
    let undocumented = descriptors
        .iter()
        .filter(|descriptor| descriptor.description.trim().is_empty())
        .map(|descriptor| descriptor.name.as_str())
        .collect::<Vec<_>>();

    if descriptors.is_empty() {
        return DoctorCheck {
            name: "capability_registry",
            status: CheckStatus::Fail,
            details: "no capabilities registered".to_string(),
        };
    }
    if !undocumented.is_empty() {
        return DoctorCheck {
            name: "capability_registry",
            status: CheckStatus::Fail,
            details: format!("capabilities without description: {}", undocumented.join(", ")),
        };
    }

    let signatures =
        descriptors.iter().map(|descriptor| descriptor.signature()).collect::<Vec<_>>();
    DoctorCheck {
        name: "capability_registry",
        status: CheckStatus::Pass,
        details: format!("{} capabilities: {}", signatures.len(), signatures.join(", ")),
    }
}

/// Checks that a client can be built; no request is sent.
fn check_completion_endpoint(config: &AppConfig) -> DoctorCheck {
    let endpoint = config.llm.endpoint();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return DoctorCheck {
            name: "completion_endpoint",
            status: CheckStatus::Fail,
            details: format!("endpoint `{endpoint}` is not an http(s) url"),
        };
    }

    match client_from_config(&config.llm) {
        Ok(_) => {
            let auth = match config.llm.provider {
                LlmProvider::Ollama => "no auth",
                LlmProvider::OpenAi | LlmProvider::Anthropic => "api key set",
            };
            DoctorCheck {
                name: "completion_endpoint",
                status: CheckStatus::Pass,
                details: format!(
                    "{} model `{}` at {endpoint} ({auth})",
                    config.llm.provider.as_str(),
                    config.llm.model
                ),
            }
        }
        Err(error) => DoctorCheck {
            name: "completion_endpoint",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
