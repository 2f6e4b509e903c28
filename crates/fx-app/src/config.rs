use crate::generator::GeneratorConfig;
use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_BASE: &str = "https://api.replicate.com/v1";
pub const FLUX_MODEL_ENDPOINT: &str =
    "https://api.replicate.com/v1/models/black-forest-labs/flux-dev/predictions";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the relay server binds to.
    pub port: u16,
    /// Base URL the controller reaches the relay at.
    pub relay_url: String,
    /// Only URLs under this prefix are forwarded by the relay.
    pub upstream_base: String,
    pub model_endpoint: String,
    pub poll_interval: Duration,
    /// `None` polls until the job reaches a terminal state.
    pub job_timeout: Option<Duration>,
    pub http_timeout: Duration,
    pub credentials_path: PathBuf,
}

impl AppConfig {
    /// Reads `.env` (if any) and then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port: u16 = parse_or(var("FX_PORT"), "FX_PORT", 3000)?;
        let poll_ms: u64 = parse_or(var("FX_POLL_INTERVAL_MS"), "FX_POLL_INTERVAL_MS", 1000)?;
        let timeout_secs: u64 = parse_or(var("FX_JOB_TIMEOUT_SECS"), "FX_JOB_TIMEOUT_SECS", 300)?;
        let http_secs: u64 = parse_or(var("FX_HTTP_TIMEOUT_SECS"), "FX_HTTP_TIMEOUT_SECS", 30)?;

        if poll_ms == 0 {
            anyhow::bail!("FX_POLL_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            port,
            relay_url: var("FX_RELAY_URL")
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}"))
                .trim_end_matches('/')
                .to_string(),
            upstream_base: var("FX_UPSTREAM_BASE")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model_endpoint: var("FX_MODEL_ENDPOINT")
                .unwrap_or_else(|| FLUX_MODEL_ENDPOINT.to_string()),
            poll_interval: Duration::from_millis(poll_ms),
            job_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            http_timeout: Duration::from_secs(http_secs),
            credentials_path: var("FX_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".fluxjutsu/credentials.json")),
        })
    }

    pub fn generator(&self) -> GeneratorConfig {
        GeneratorConfig {
            model_endpoint: self.model_endpoint.clone(),
            poll_interval: self.poll_interval,
            job_timeout: self.job_timeout,
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .parse()
            .with_context(|| format!("{key} must be a number, got `{value}`")),
        None => Ok(default),
    }
}
