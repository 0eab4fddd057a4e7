use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ASSISTANT_ID: &str = "assistant-281f1430-c7a0-4186-a699-d0de5f3acf6d";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telnyx: TelnyxConfig,
    pub server: ServerConfig,
    pub transcript: TranscriptConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelnyxConfig {
    pub api_key: Option<SecretString>,
    pub phone_number: Option<String>,
    pub assistant_id: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

impl TelnyxConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub public_base_url: Option<String>,
    pub graceful_shutdown_secs: u64,
}

/// Pacing and limits for the live call transcript poller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptConfig {
    pub poll_interval_ms: u64,
    pub ringing_interval_ms: u64,
    pub max_attempts: u32,
    pub idle_after_secs: i64,
    pub match_window_secs: i64,
}

impl TranscriptConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ringing_interval(&self) -> Duration {
        Duration::from_millis(self.ringing_interval_ms)
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_500,
            ringing_interval_ms: 2_000,
            max_attempts: 180,
            idle_after_secs: 15,
            match_window_secs: 120,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub public_base_url: Option<String>,
    pub telnyx_api_key: Option<String>,
    pub telnyx_phone_number: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://horizon.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telnyx: TelnyxConfig {
                api_key: None,
                phone_number: None,
                assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
                api_base_url: "https://api.telnyx.com/v2".to_string(),
                timeout_secs: 15,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                public_base_url: None,
                graceful_shutdown_secs: 15,
            },
            transcript: TranscriptConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("horizon.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telnyx) = patch.telnyx {
            if let Some(api_key) = telnyx.api_key {
                self.telnyx.api_key = Some(secret_value(api_key));
            }
            if let Some(phone_number) = telnyx.phone_number {
                self.telnyx.phone_number = Some(phone_number);
            }
            if let Some(assistant_id) = telnyx.assistant_id {
                self.telnyx.assistant_id = assistant_id;
            }
            if let Some(api_base_url) = telnyx.api_base_url {
                self.telnyx.api_base_url = api_base_url;
            }
            if let Some(timeout_secs) = telnyx.timeout_secs {
                self.telnyx.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(public_base_url) = server.public_base_url {
                self.server.public_base_url = Some(public_base_url);
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(transcript) = patch.transcript {
            if let Some(poll_interval_ms) = transcript.poll_interval_ms {
                self.transcript.poll_interval_ms = poll_interval_ms;
            }
            if let Some(ringing_interval_ms) = transcript.ringing_interval_ms {
                self.transcript.ringing_interval_ms = ringing_interval_ms;
            }
            if let Some(max_attempts) = transcript.max_attempts {
                self.transcript.max_attempts = max_attempts;
            }
            if let Some(idle_after_secs) = transcript.idle_after_secs {
                self.transcript.idle_after_secs = idle_after_secs;
            }
            if let Some(match_window_secs) = transcript.match_window_secs {
                self.transcript.match_window_secs = match_window_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HORIZON_DATABASE_URL").or_else(|| read_env("DATABASE_URL"))
        {
            self.database.url = value;
        }
        if let Some(value) = read_env("HORIZON_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("HORIZON_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HORIZON_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("HORIZON_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let api_key = read_env("HORIZON_TELNYX_API_KEY").or_else(|| read_env("TELNYX_API_KEY"));
        if let Some(value) = api_key {
            self.telnyx.api_key = Some(secret_value(value));
        }
        let phone_number =
            read_env("HORIZON_TELNYX_PHONE_NUMBER").or_else(|| read_env("TELNYX_PHONE_NUMBER"));
        if let Some(value) = phone_number {
            self.telnyx.phone_number = Some(value);
        }
        if let Some(value) = read_env("HORIZON_TELNYX_ASSISTANT_ID") {
            self.telnyx.assistant_id = value;
        }
        if let Some(value) = read_env("HORIZON_TELNYX_API_BASE_URL") {
            self.telnyx.api_base_url = value;
        }
        if let Some(value) = read_env("HORIZON_TELNYX_TIMEOUT_SECS") {
            self.telnyx.timeout_secs = parse_u64("HORIZON_TELNYX_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HORIZON_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HORIZON_SERVER_PORT") {
            self.server.port = parse_u16("HORIZON_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("HORIZON_SERVER_PUBLIC_BASE_URL") {
            self.server.public_base_url = Some(value);
        }
        if let Some(value) = read_env("HORIZON_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HORIZON_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("HORIZON_TRANSCRIPT_POLL_INTERVAL_MS") {
            self.transcript.poll_interval_ms =
                parse_u64("HORIZON_TRANSCRIPT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("HORIZON_TRANSCRIPT_MAX_ATTEMPTS") {
            self.transcript.max_attempts = parse_u32("HORIZON_TRANSCRIPT_MAX_ATTEMPTS", &value)?;
        }

        let log_level =
            read_env("HORIZON_LOGGING_LEVEL").or_else(|| read_env("HORIZON_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HORIZON_LOGGING_FORMAT").or_else(|| read_env("HORIZON_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(public_base_url) = overrides.public_base_url {
            self.server.public_base_url = Some(public_base_url);
        }
        if let Some(api_key) = overrides.telnyx_api_key {
            self.telnyx.api_key = Some(secret_value(api_key));
        }
        if let Some(phone_number) = overrides.telnyx_phone_number {
            self.telnyx.phone_number = Some(phone_number);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telnyx(&self.telnyx)?;
        validate_server(&self.server)?;
        validate_transcript(&self.transcript)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("horizon.toml"), PathBuf::from("config/horizon.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telnyx(telnyx: &TelnyxConfig) -> Result<(), ConfigError> {
    if !is_http_url(&telnyx.api_base_url) {
        return Err(ConfigError::Validation(
            "telnyx.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if telnyx.timeout_secs == 0 || telnyx.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "telnyx.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if telnyx.assistant_id.trim().is_empty() {
        return Err(ConfigError::Validation("telnyx.assistant_id must not be empty".to_string()));
    }

    if let Some(phone_number) = &telnyx.phone_number {
        if !phone_number.starts_with('+') {
            return Err(ConfigError::Validation(
                "telnyx.phone_number must be in E.164 format (e.g. `+14155550100`)".to_string(),
            ));
        }
        if !telnyx.is_configured() {
            return Err(ConfigError::Validation(
                "telnyx.phone_number is set but telnyx.api_key is missing. Get a key from https://portal.telnyx.com > Auth > API Keys".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(base_url) = &server.public_base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "server.public_base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_transcript(transcript: &TranscriptConfig) -> Result<(), ConfigError> {
    if transcript.poll_interval_ms == 0 || transcript.ringing_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "transcript poll intervals must be greater than zero".to_string(),
        ));
    }

    if transcript.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "transcript.max_attempts must be greater than zero".to_string(),
        ));
    }

    if transcript.idle_after_secs <= 0 || transcript.match_window_secs <= 0 {
        return Err(ConfigError::Validation(
            "transcript.idle_after_secs and transcript.match_window_secs must be positive"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telnyx: Option<TelnyxPatch>,
    server: Option<ServerPatch>,
    transcript: Option<TranscriptPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelnyxPatch {
    api_key: Option<String>,
    phone_number: Option<String>,
    assistant_id: Option<String>,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptPatch {
    poll_interval_ms: Option<u64>,
    ringing_interval_ms: Option<u64>,
    max_attempts: Option<u32>,
    idle_after_secs: Option<i64>,
    match_window_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
