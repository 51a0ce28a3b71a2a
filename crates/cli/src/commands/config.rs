use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use opsdesk_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILES};
use secrecy::ExposeSecret;
use toml::Value;

/// One reported setting: dotted key, rendered value, env keys that can set it.
struct Setting {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(
            setting.key,
            setting.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(setting.key, &setting.value, source));
    }

    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Setting {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["OPSDESK_DATABASE_URL"],
        },
        Setting {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["OPSDESK_DATABASE_MAX_CONNECTIONS"],
        },
        Setting {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["OPSDESK_DATABASE_TIMEOUT_SECS"],
        },
        Setting {
            key: "llm.provider",
            value: config.llm.provider.as_str().to_string(),
            env_keys: &["OPSDESK_LLM_PROVIDER"],
        },
        Setting {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["OPSDESK_LLM_MODEL"],
        },
        Setting {
            key: "llm.base_url",
            value: config.llm.effective_base_url(),
            env_keys: &["OPSDESK_LLM_BASE_URL"],
        },
        Setting {
            key: "llm.api_key",
            value: api_key,
            env_keys: &["OPSDESK_LLM_API_KEY", "OPENAI_API_KEY"],
        },
        Setting {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["OPSDESK_LLM_TIMEOUT_SECS"],
        },
        Setting {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["OPSDESK_SERVER_BIND_ADDRESS"],
        },
        Setting {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["OPSDESK_SERVER_PORT"],
        },
        Setting {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["OPSDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Setting {
            key: "agent.max_result_chars",
            value: match config.agent.result_limit() {
                Some(limit) => limit.to_string(),
                None => "0 (unbounded)".to_string(),
            },
            env_keys: &["OPSDESK_AGENT_MAX_RESULT_CHARS"],
        },
        Setting {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["OPSDESK_LOGGING_LEVEL", "OPSDESK_LOG_LEVEL"],
        },
        Setting {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_keys: &["OPSDESK_LOGGING_FORMAT", "OPSDESK_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().copied().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token, render_line};

    #[test]
    fn api_keys_keep_only_their_prefix() {
        assert_eq!(redact_token("sk-proj-abcdef"), "sk-***");
        assert_eq!(redact_token("plainsecret"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn dotted_paths_are_resolved_in_toml_documents() {
        let doc: toml::Value = "[llm]\nmodel = \"gpt-4o\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn lines_name_their_source() {
        assert_eq!(
            render_line("llm.model", "gpt-4o-mini", "default".to_string()),
            "- llm.model = gpt-4o-mini (source: default)"
        );
    }
}
