use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub heartbeat_interval: Duration,
    pub token_ttl: chrono::Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let jwt_secret = lookup("MURMUR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MURMUR_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = var("MURMUR_HOST", "0.0.0.0");
        let port: u16 = var("MURMUR_PORT", "3000")
            .parse()
            .context("MURMUR_PORT is not a valid port")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        let heartbeat_secs: u64 = var("MURMUR_HEARTBEAT_SECS", "25")
            .parse()
            .context("MURMUR_HEARTBEAT_SECS is not a number")?;
        if heartbeat_secs == 0 {
            bail!("MURMUR_HEARTBEAT_SECS must be at least 1");
        }

        let ttl_days: i64 = var("MURMUR_TOKEN_TTL_DAYS", "7")
            .parse()
            .context("MURMUR_TOKEN_TTL_DAYS is not a number")?;
        if ttl_days < 1 {
            bail!("MURMUR_TOKEN_TTL_DAYS must be at least 1");
        }

        Ok(Self {
            jwt_secret,
            db_path: var("MURMUR_DB_PATH", "murmur.db").into(),
            addr,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            token_ttl: chrono::Duration::days(ttl_days),
        })
    }
}
