use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Recovery Assistant";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scoring service endpoint used when no override is set.
pub const DEFAULT_PREDICT_URL: &str = "http://127.0.0.1:5000/predict";

pub const PREDICT_URL_ENV: &str = "RECOVERY_ASSISTANT_PREDICT_URL";
pub const PREDICT_TIMEOUT_ENV: &str = "RECOVERY_ASSISTANT_PREDICT_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_ENV: &str = "RECOVERY_ASSISTANT_CONNECT_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Log filter applied when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,recovery_assistant_lib=debug,reqwest=warn,hyper=warn"
}

/// Connection settings for the external risk scoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionConfig {
    pub predict_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            predict_url: DEFAULT_PREDICT_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl PredictionConfig {
    /// Read settings from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (environment, test map).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let predict_url = lookup(PREDICT_URL_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.predict_url);

        Self {
            predict_url,
            request_timeout_secs: parse_secs(
                PREDICT_TIMEOUT_ENV,
                lookup(PREDICT_TIMEOUT_ENV),
                defaults.request_timeout_secs,
            ),
            connect_timeout_secs: parse_secs(
                CONNECT_TIMEOUT_ENV,
                lookup(CONNECT_TIMEOUT_ENV),
                defaults.connect_timeout_secs,
            ),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn parse_secs(key: &str, raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => {
            tracing::warn!(key, value = %raw, default, "Ignoring invalid timeout setting");
            default
        }
    }
}
