use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

const DEFAULT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub secret_key: String,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub session_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so tests don't have to touch the process env.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_url = get("DATABASE_URL").unwrap_or_else(|| "warbler.db".into());
        let db_path = PathBuf::from(db_url.strip_prefix("sqlite://").unwrap_or(&db_url));

        let secret_key = get("SECRET_KEY").unwrap_or_else(|| {
            warn!("SECRET_KEY not set, using an insecure development key");
            DEFAULT_SECRET.into()
        });

        let port = match get("WARBLER_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("WARBLER_PORT is not a valid port: {raw}"))?,
            None => 5000,
        };
        let session_days = match get("WARBLER_SESSION_DAYS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("WARBLER_SESSION_DAYS is not a number: {raw}"))?,
            None => 30,
        };
        anyhow::ensure!(session_days > 0, "WARBLER_SESSION_DAYS must be positive");

        Ok(Self {
            db_path,
            secret_key,
            host: get("WARBLER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            static_dir: PathBuf::from(get("WARBLER_STATIC_DIR").unwrap_or_else(|| "static".into())),
            session_days,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_days)
    }
}
