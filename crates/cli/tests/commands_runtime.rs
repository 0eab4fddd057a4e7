use std::env;
use std::sync::{Mutex, OnceLock};

use horizon_cli::commands::{config, doctor, migrate, seed};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("HORIZON_DATABASE_URL", url.as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_unsupported_database() {
    with_env(&[("HORIZON_DATABASE_URL", "postgres://localhost/horizon")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_the_hotel_dataset() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("HORIZON_DATABASE_URL", url.as_str())], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(
            payload["message"],
            "hotel seed dataset loaded: 25 rooms, 6 bookings, 3 call logs"
        );
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("HORIZON_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn config_reports_env_sources_and_redacts_the_api_key() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(&dir);
    with_env(
        &[
            ("HORIZON_DATABASE_URL", url.as_str()),
            ("TELNYX_API_KEY", "KEYsupersecretvalue"),
            ("TELNYX_PHONE_NUMBER", "+14155550100"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "{}", result.output);
            assert!(result.output.contains("(source: env (HORIZON_DATABASE_URL))"));
            assert!(result.output.contains("- telnyx.api_key = KEY*** (source: env (TELNYX_API_KEY))"));
            assert!(!result.output.contains("supersecretvalue"));
            assert!(result.output.contains("- server.port = 3000 (source: default)"));
        },
    );
}

#[test]
fn doctor_passes_without_telnyx_credentials() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("HORIZON_DATABASE_URL", url.as_str())], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "pass");
        let statuses: Vec<(String, String)> = report["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .map(|check| {
                (
                    check["name"].as_str().unwrap_or_default().to_string(),
                    check["status"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("config_validation".to_string(), "pass".to_string()),
                ("telnyx_readiness".to_string(), "skipped".to_string()),
                ("database_connectivity".to_string(), "pass".to_string()),
            ]
        );
    });
}

#[test]
fn doctor_fails_when_config_is_invalid() {
    with_env(&[("HORIZON_DATABASE_URL", "postgres://localhost/horizon")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 6, "expected doctor failure code");
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [skip] database_connectivity"));
    });
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("horizon.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "DATABASE_URL",
        "HORIZON_DATABASE_URL",
        "HORIZON_DATABASE_MAX_CONNECTIONS",
        "HORIZON_DATABASE_TIMEOUT_SECS",
        "HORIZON_TELNYX_API_KEY",
        "HORIZON_TELNYX_PHONE_NUMBER",
        "HORIZON_TELNYX_ASSISTANT_ID",
        "HORIZON_TELNYX_API_BASE_URL",
        "HORIZON_TELNYX_TIMEOUT_SECS",
        "TELNYX_API_KEY",
        "TELNYX_PHONE_NUMBER",
        "HORIZON_SERVER_BIND_ADDRESS",
        "HORIZON_SERVER_PORT",
        "HORIZON_SERVER_PUBLIC_BASE_URL",
        "HORIZON_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "HORIZON_TRANSCRIPT_POLL_INTERVAL_MS",
        "HORIZON_TRANSCRIPT_MAX_ATTEMPTS",
        "HORIZON_LOGGING_LEVEL",
        "HORIZON_LOGGING_FORMAT",
        "HORIZON_LOG_LEVEL",
        "HORIZON_LOG_FORMAT",
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
