use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::RoleChangePolicy;

const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 14;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366 * 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Public base URL for external access (e.g., "https://isotopes.example.org").
    /// Used for generating signup links. If not set, links are relative.
    pub public_base_url: Option<String>,
    /// Lifetime of a login session, at most ten years.
    pub session_ttl_hours: i64,
    /// When set, signing up without a valid signup key creates an unverified
    /// account instead of being refused.
    pub open_signup: bool,
    pub role_policy: RoleChangePolicy,
}

impl ServerConfig {
    /// Reads a TOML config file. Missing keys fall back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(Error::Config(format!(
                "session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}, got {}",
                self.session_ttl_hours
            )));
        }
        Ok(())
    }

    /// Session lifetime, clamped into the accepted range.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("cheis.db")
    }

    #[must_use]
    pub fn signup_link(&self, key: &str) -> String {
        signup_link(self.public_base_url.as_deref(), key)
    }
}

/// Signup URL carrying `key`, relative when no base URL is configured.
#[must_use]
pub fn signup_link(public_base_url: Option<&str>, key: &str) -> String {
    let base = public_base_url.unwrap_or("").trim_end_matches('/');
    format!(
        "{base}/user/signup?signup_key={}",
        urlencoding::encode(key)
    )
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            public_base_url: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            open_signup: false,
            role_policy: RoleChangePolicy::default(),
        }
    }
}
