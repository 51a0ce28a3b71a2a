use std::sync::Arc;

use opsdesk_agent::operations::{default_registry, RecordStores};
use opsdesk_core::config::{AppConfig, LlmProvider, LoadOptions};
use opsdesk_db::repositories::{InMemoryClientRepository, InMemoryTeamMemberRepository};
use opsdesk_db::{connect_with_settings, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
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

const DEPENDENT_CHECKS: [&str; 3] =
    ["llm_credentials", "operation_catalog", "database_connectivity"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
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
            checks.push(check_llm_credentials(&config));
            checks.push(check_operation_catalog());
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

// Presence is enforced by config validation; this reports what will be used.
fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let credential = if config.llm.api_key.is_some() { "api key set" } else { "no api key" };
    let provider_ready = match config.llm.provider {
        LlmProvider::OpenAi => config.llm.api_key.is_some(),
        LlmProvider::OpenAiCompatible => config.llm.base_url.is_some(),
    };

    DoctorCheck {
        name: "llm_credentials",
        status: if provider_ready { CheckStatus::Pass } else { CheckStatus::Fail },
        details: format!(
            "{} model `{}` at {} ({credential})",
            config.llm.provider.as_str(),
            config.llm.model,
            config.llm.effective_base_url()
        ),
    }
}

fn check_operation_catalog() -> DoctorCheck {
    let stores = RecordStores {
        team_members: Arc::new(InMemoryTeamMemberRepository::default()),
        clients: Arc::new(InMemoryClientRepository::default()),
    };

    match default_registry(&stores) {
        Ok(registry) => DoctorCheck {
            name: "operation_catalog",
            status: CheckStatus::Pass,
            details: format!("{} operations registered", registry.len()),
        },
        Err(error) => DoctorCheck {
            name: "operation_catalog",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let applied = migrations::applied_count(&pool)
            .await
            .map_err(|error| format!("failed to read migration state: {error}"));
        pool.close().await;
        applied
    });

    match result {
        Ok(applied) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!(
                "connected using `{}`; {applied} of {} migrations applied",
                config.database.url,
                migrations::known_count()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
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

#[cfg(test)]
mod tests {
    use super::{check_operation_catalog, render_human, summarize, CheckStatus, DoctorCheck};

    #[test]
    fn catalog_check_counts_every_operation() {
        let check = check_operation_catalog();

        assert_eq!(check.status, CheckStatus::Pass);
        assert_eq!(check.details, "11 operations registered");
    }

    #[test]
    fn any_skipped_check_fails_the_report() {
        let report = summarize(vec![
            DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "ok".into(),
            },
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Skipped,
                details: "skipped".into(),
            },
        ]);

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(
            render_human(&report),
            "doctor: one or more readiness checks failed\n\
             - [ok] config_validation: ok\n\
             - [skip] database_connectivity: skipped"
        );
    }
}
