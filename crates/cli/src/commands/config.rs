use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use horizon_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> CommandResult {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => CommandResult { exit_code: 0, output: render(&config) },
        Err(error) => CommandResult::failure(
            "config",
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        ),
    }
}

fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let unset = || "<unset>".to_string();
    let telnyx_key = config
        .telnyx
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(unset);

    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["HORIZON_DATABASE_URL", "DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["HORIZON_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["HORIZON_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "telnyx.api_key",
            value: telnyx_key,
            env_keys: &["HORIZON_TELNYX_API_KEY", "TELNYX_API_KEY"],
        },
        Field {
            key: "telnyx.phone_number",
            value: config.telnyx.phone_number.clone().unwrap_or_else(unset),
            env_keys: &["HORIZON_TELNYX_PHONE_NUMBER", "TELNYX_PHONE_NUMBER"],
        },
        Field {
            key: "telnyx.assistant_id",
            value: config.telnyx.assistant_id.clone(),
            env_keys: &["HORIZON_TELNYX_ASSISTANT_ID"],
        },
        Field {
            key: "telnyx.api_base_url",
            value: config.telnyx.api_base_url.clone(),
            env_keys: &["HORIZON_TELNYX_API_BASE_URL"],
        },
        Field {
            key: "telnyx.timeout_secs",
            value: config.telnyx.timeout_secs.to_string(),
            env_keys: &["HORIZON_TELNYX_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["HORIZON_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["HORIZON_SERVER_PORT"],
        },
        Field {
            key: "server.public_base_url",
            value: config.server.public_base_url.clone().unwrap_or_else(unset),
            env_keys: &["HORIZON_SERVER_PUBLIC_BASE_URL"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["HORIZON_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "transcript.poll_interval_ms",
            value: config.transcript.poll_interval_ms.to_string(),
            env_keys: &["HORIZON_TRANSCRIPT_POLL_INTERVAL_MS"],
        },
        Field {
            key: "transcript.max_attempts",
            value: config.transcript.max_attempts.to_string(),
            env_keys: &["HORIZON_TRANSCRIPT_MAX_ATTEMPTS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["HORIZON_LOGGING_LEVEL", "HORIZON_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["HORIZON_LOGGING_FORMAT", "HORIZON_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("horizon.toml"), PathBuf::from("config/horizon.toml")]
        .into_iter()
        .find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

/// Keeps the key's leading segment (Telnyx keys start `KEY`) and hides the rest.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let prefix: String = trimmed.chars().take_while(|c| c.is_ascii_uppercase()).collect();
    if prefix.is_empty() || prefix.len() == trimmed.len() {
        return "<redacted>".to_string();
    }
    format!("{prefix}***")
}
