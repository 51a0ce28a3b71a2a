use std::env;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use opsdesk_agent::llm::{
    ChatRequest, EventStream, GatewayError, InvocationRequest, LlmClient, Reply, StreamEvent,
};
use opsdesk_agent::Role;
use opsdesk_cli::commands::ask::{self, AskRequest};
use opsdesk_cli::commands::{config, doctor, migrate, seed};
use opsdesk_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use serde_json::Value;

const VALID_ENV: &[(&str, &str)] =
    &[("OPSDESK_LLM_API_KEY", "sk-test"), ("OPSDESK_DATABASE_URL", "sqlite::memory:")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_credentials() {
    with_env(&[("OPSDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_reports_demo_records() {
    with_env(VALID_ENV, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message
            .starts_with("demo records ready: 3 team members (3 new), 2 clients (2 new)"));
        assert!(message.contains("  - team member: katherine.johnson@opsdesk.test"));
        assert!(message.contains("  - client: it@globex.test"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("seed.db").display());

    let vars = [("OPSDESK_LLM_API_KEY", "sk-test"), ("OPSDESK_DATABASE_URL", url.as_str())];
    with_env(&vars, || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        let message = second_payload["message"].as_str().unwrap_or("");
        assert!(message
            .starts_with("demo records ready: 3 team members (0 new), 2 clients (0 new)"));
    });
}

#[test]
fn config_redacts_the_api_key_and_names_sources() {
    let vars =
        [("OPSDESK_LLM_API_KEY", "sk-live-secret"), ("OPSDESK_DATABASE_URL", "sqlite::memory:")];
    with_env(&vars, || {
        let output = config::run();

        assert!(output.contains("- llm.api_key = sk-*** (source: env (OPSDESK_LLM_API_KEY))"));
        assert!(output
            .contains("- database.url = sqlite::memory: (source: env (OPSDESK_DATABASE_URL))"));
        assert!(output.contains("- llm.model = gpt-4o-mini (source: default)"));
        assert!(!output.contains("live-secret"));
    });
}

#[test]
fn doctor_json_passes_with_valid_env() {
    with_env(VALID_ENV, || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "config_validation",
                "llm_credentials",
                "operation_catalog",
                "database_connectivity"
            ]
        );
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][3]["status"], "skipped");
    });
}

#[test]
fn ask_returns_config_failure_without_credentials() {
    with_env(&[("OPSDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = ask::run(AskRequest { text: "hello".to_string(), ..AskRequest::default() });

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn ask_runs_one_operation_and_reports_the_reply() {
    with_env(&[], || {
        let request =
            AskRequest { text: "who is on the team?".to_string(), ..AskRequest::default() };
        let mut out = Vec::new();

        let result = ask::run_with_gateway(&test_config(), Arc::new(Roster), &request, &mut out);

        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["message"], "Roster: No team members registered yet.");
        assert!(out.is_empty(), "blocking mode prints nothing while running");
    });
}

#[test]
fn ask_streams_fragments_before_the_summary() {
    with_env(&[], || {
        let request = AskRequest {
            text: "who is on the team?".to_string(),
            stream: true,
            ..AskRequest::default()
        };
        let mut out = Vec::new();

        let result = ask::run_with_gateway(&test_config(), Arc::new(Roster), &request, &mut out);

        assert_eq!(result.exit_code, 0);
        let printed = String::from_utf8(out).expect("utf8");
        assert_eq!(printed, "Roster: No team members registered yet.\n");
        assert_eq!(
            parse_payload(&result.output)["message"],
            "Roster: No team members registered yet."
        );
    });
}

#[test]
fn ask_reports_backend_failures_with_agent_exit_code() {
    with_env(&[], || {
        let request = AskRequest { text: "hello".to_string(), ..AskRequest::default() };

        let mut out = Vec::new();

        let result =
            ask::run_with_gateway(&test_config(), Arc::new(Unreachable), &request, &mut out);

        assert_eq!(result.exit_code, 6);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "agent");
        assert_eq!(payload["message"], "[Error: request timed out]");
    });
}

#[test]
fn ask_treats_error_looking_model_text_as_a_reply() {
    with_env(&[], || {
        for stream in [false, true] {
            let request = AskRequest { text: "hello".to_string(), stream, ..AskRequest::default() };

            let mut out = Vec::new();

            let result =
                ask::run_with_gateway(&test_config(), Arc::new(Mimic), &request, &mut out);

            assert_eq!(result.exit_code, 0, "stream: {stream}");
            assert_eq!(parse_payload(&result.output)["message"], MIMIC_REPLY);
        }
    });
}

const MIMIC_REPLY: &str = "[Error: this is just what the model wrote]";

/// Answers with text that looks like a backend diagnostic.
struct Mimic;

#[async_trait]
impl LlmClient for Mimic {
    async fn complete(&self, _request: ChatRequest<'_>) -> Result<Reply, GatewayError> {
        Ok(Reply::Text(MIMIC_REPLY.to_string()))
    }

    async fn complete_streaming(
        &self,
        _request: ChatRequest<'_>,
    ) -> Result<EventStream, GatewayError> {
        let events = vec![Ok(StreamEvent::Text(MIMIC_REPLY.to_string())), Ok(StreamEvent::End)];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

/// Lists team members, then quotes the operation result back.
struct Roster;

impl Roster {
    fn decide(request: &ChatRequest<'_>) -> Reply {
        match request.turns.last() {
            Some(turn) if turn.role() == Role::Operation => {
                Reply::Text(format!("Roster: {}", turn.content()))
            }
            _ => Reply::Invocation(InvocationRequest {
                name: "list_team_members".to_string(),
                raw_arguments: "{}".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LlmClient for Roster {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<Reply, GatewayError> {
        Ok(Self::decide(&request))
    }

    async fn complete_streaming(
        &self,
        request: ChatRequest<'_>,
    ) -> Result<EventStream, GatewayError> {
        let events = match Self::decide(&request) {
            Reply::Text(text) => vec![Ok(StreamEvent::Text(text)), Ok(StreamEvent::End)],
            Reply::Invocation(_) => vec![Ok(StreamEvent::Invocation)],
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

struct Unreachable;

#[async_trait]
impl LlmClient for Unreachable {
    async fn complete(&self, _request: ChatRequest<'_>) -> Result<Reply, GatewayError> {
        Err(GatewayError::Timeout)
    }

    async fn complete_streaming(
        &self,
        _request: ChatRequest<'_>,
    ) -> Result<EventStream, GatewayError> {
        Err(GatewayError::Timeout)
    }
}

fn test_config() -> AppConfig {
    AppConfig::load(LoadOptions {
        overrides: ConfigOverrides {
            database_url: Some("sqlite::memory:".to_string()),
            llm_api_key: Some("sk-test".to_string()),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    })
    .expect("test config")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "OPSDESK_DATABASE_URL",
        "OPSDESK_DATABASE_MAX_CONNECTIONS",
        "OPSDESK_DATABASE_TIMEOUT_SECS",
        "OPSDESK_LLM_PROVIDER",
        "OPSDESK_LLM_API_KEY",
        "OPENAI_API_KEY",
        "OPSDESK_LLM_BASE_URL",
        "OPSDESK_LLM_MODEL",
        "OPSDESK_LLM_TIMEOUT_SECS",
        "OPSDESK_SERVER_BIND_ADDRESS",
        "OPSDESK_SERVER_PORT",
        "OPSDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "OPSDESK_AGENT_MAX_RESULT_CHARS",
        "OPSDESK_LOGGING_LEVEL",
        "OPSDESK_LOGGING_FORMAT",
        "OPSDESK_LOG_LEVEL",
        "OPSDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
