use prism_providers::replicate::{self, ReplicateConfig, DEFAULT_API_URL};
use prism_providers::mock;

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Without
/// `DATABASE_URL` the server keeps jobs in memory.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub database_url: Option<String>,
    /// Base URL providers can reach us at. Unset means poll-only.
    pub public_base_url: Option<String>,
    /// Reject webhooks with a bad signature (default: `true`).
    pub strict_webhook_validation: bool,
    /// Present only when `REPLICATE_API_TOKEN` is set.
    pub replicate: Option<ReplicateConfig>,
    /// Register the in-process scripted provider (default: `false`).
    pub enable_mock_provider: bool,
    pub mock_webhook_secret: String,
    /// JSON file of model routes registered at startup.
    pub model_routes_path: Option<String>,
    /// Age in seconds after which a non-terminal job counts as stuck.
    pub stale_job_secs: i64,
    /// Sweeper interval in seconds; `0` disables the sweeper.
    pub poll_interval_secs: u64,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                        |
    /// |-----------------------------|--------------------------------|
    /// | `HOST`                      | `0.0.0.0`                      |
    /// | `PORT`                      | `3000`                         |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`        |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                           |
    /// | `DATABASE_URL`              | unset (in-memory store)        |
    /// | `PUBLIC_BASE_URL`           | unset (poll-only)              |
    /// | `STRICT_WEBHOOK_VALIDATION` | `true`                         |
    /// | `REPLICATE_API_TOKEN`       | unset (adapter not registered) |
    /// | `REPLICATE_API_URL`         | `https://api.replicate.com/v1` |
    /// | `REPLICATE_WEBHOOK_SECRET`  | empty                          |
    /// | `ENABLE_MOCK_PROVIDER`      | `false`                        |
    /// | `MOCK_WEBHOOK_SECRET`       | empty                          |
    /// | `MODEL_ROUTES_PATH`         | unset                          |
    /// | `STALE_JOB_SECS`            | `900`                          |
    /// | `POLL_INTERVAL_SECS`        | `0` (sweeper disabled)         |
    /// | `LOG_FORMAT`                | `text`                         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let replicate = optional_var("REPLICATE_API_TOKEN").map(|api_token| ReplicateConfig {
            api_url: optional_var("REPLICATE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            api_token,
            webhook_secret: std::env::var("REPLICATE_WEBHOOK_SECRET").unwrap_or_default(),
        });

        let stale_job_secs: i64 = std::env::var("STALE_JOB_SECS")
            .unwrap_or_else(|_| prism_core::status::DEFAULT_STALE_JOB_SECS.to_string())
            .parse()
            .expect("STALE_JOB_SECS must be a valid i64");

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url: optional_var("DATABASE_URL"),
            public_base_url: optional_var("PUBLIC_BASE_URL"),
            strict_webhook_validation: bool_var("STRICT_WEBHOOK_VALIDATION", true),
            replicate,
            enable_mock_provider: bool_var("ENABLE_MOCK_PROVIDER", false),
            mock_webhook_secret: std::env::var("MOCK_WEBHOOK_SECRET").unwrap_or_default(),
            model_routes_path: optional_var("MODEL_ROUTES_PATH"),
            stale_job_secs,
            poll_interval_secs,
            log_format,
        }
    }

    /// Registered providers whose webhooks can never be accepted: callbacks
    /// are requested, validation is strict, and the signing secret is empty.
    pub fn unverifiable_webhook_providers(&self) -> Vec<&'static str> {
        if self.public_base_url.is_none() || !self.strict_webhook_validation {
            return Vec::new();
        }

        let mut providers = Vec::new();
        if self
            .replicate
            .as_ref()
            .is_some_and(|r| r.webhook_secret.is_empty())
        {
            providers.push(replicate::PROVIDER_NAME);
        }
        if self.enable_mock_provider && self.mock_webhook_secret.is_empty() {
            providers.push(mock::PROVIDER_NAME);
        }
        providers
    }
}

/// A variable that counts as unset when empty.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bool_var(name: &str, default: bool) -> bool {
    match optional_var(name) {
        None => default,
        Some(v) => parse_bool(&v).unwrap_or_else(|| panic!("{name} must be true or false")),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    fn config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
            database_url: None,
            public_base_url: Some("https://app.example.com".into()),
            strict_webhook_validation: true,
            replicate: Some(ReplicateConfig {
                api_url: DEFAULT_API_URL.into(),
                api_token: "token".into(),
                webhook_secret: String::new(),
            }),
            enable_mock_provider: true,
            mock_webhook_secret: "secret".into(),
            model_routes_path: None,
            stale_job_secs: 900,
            poll_interval_secs: 0,
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn empty_secret_with_strict_callbacks_is_flagged() {
        assert_eq!(config().unverifiable_webhook_providers(), vec!["replicate"]);
    }

    #[test]
    fn empty_secret_is_fine_without_callbacks_or_strictness() {
        let poll_only = ServerConfig {
            public_base_url: None,
            ..config()
        };
        assert!(poll_only.unverifiable_webhook_providers().is_empty());

        let lenient = ServerConfig {
            strict_webhook_validation: false,
            ..config()
        };
        assert!(lenient.unverifiable_webhook_providers().is_empty());
    }
}
