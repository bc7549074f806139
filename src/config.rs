use anyhow::{anyhow, Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_api_url: String,
    pub bind_addr: String,
    pub backend_timeout: Duration,
    pub refetch_delay: Duration,
    pub wizard_session_ttl: chrono::Duration,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend_api_url = lookup("BACKEND_API_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("BACKEND_API_URL missing"))?;
        if !backend_api_url.starts_with("http://") && !backend_api_url.starts_with("https://") {
            return Err(anyhow!("BACKEND_API_URL must be an http(s) URL"));
        }

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| {
            let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let backend_timeout_secs = parse_or(&lookup, "BACKEND_TIMEOUT_SECS", 30)?;
        let refetch_delay_ms = parse_or(&lookup, "REFETCH_DELAY_MS", 500)?;
        let ttl_minutes = parse_or(&lookup, "WIZARD_SESSION_TTL_MINUTES", 120)?;

        Ok(Self {
            backend_api_url: backend_api_url.trim_end_matches('/').to_string(),
            bind_addr,
            backend_timeout: Duration::from_secs(backend_timeout_secs),
            refetch_delay: Duration::from_millis(refetch_delay_ms),
            wizard_session_ttl: chrono::Duration::minutes(ttl_minutes as i64),
            cors_origin: lookup("CORS_ORIGIN").filter(|v| !v.trim().is_empty()),
        })
    }
}

fn parse_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a non-negative integer")),
        None => Ok(default),
    }
}
