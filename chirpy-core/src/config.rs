//! Configuration for the Chirpy auth core
//!
//! Loaded once at process start and shared read-only afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Duration;

use crate::error::{AuthError, Result};

/// Deployment classification. `Production` turns on `Secure` cookies,
/// `Dev` unlocks the reset endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Dev,
    Test,
    Production,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Platform {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(AuthError::Config(format!("unknown platform: {other}"))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How session tokens travel between client and server. Picked once per
/// deployment; see [`crate::auth::transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Bearer,
    Cookie,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
            Self::Cookie => "cookie",
        }
    }
}

impl FromStr for TransportKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bearer" | "header" => Ok(Self::Bearer),
            "cookie" => Ok(Self::Cookie),
            other => Err(AuthError::Config(format!("unknown session transport: {other}"))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auth core configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    pub jwt_secret: String,

    /// Shared secret expected from the payment provider webhook
    pub polka_key: String,

    pub platform: Platform,

    pub transport: TransportKind,

    /// Lifetime of access tokens. The cookie transport uses the same value
    /// for the `access_token` cookie `Max-Age`.
    pub access_token_ttl: Duration,

    /// Lifetime of refresh tokens (default: 60 days)
    pub refresh_token_ttl: Duration,

    /// Root directory for the Delta tables
    pub data_dir: PathBuf,
}

pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 60;

impl AuthConfig {
    /// Config with defaults: dev platform, bearer transport, 1 hour access
    /// tokens, 60 day refresh tokens, data under `./data`.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            polka_key: String::new(),
            platform: Platform::Dev,
            transport: TransportKind::Bearer,
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            data_dir: PathBuf::from("data"),
        }
    }

    /// Load from process environment
    ///
    /// | variable                 | default  |
    /// |--------------------------|----------|
    /// | `JWT_SECRET`             | required |
    /// | `POLKA_KEY`              | empty    |
    /// | `PLATFORM`               | `dev`    |
    /// | `SESSION_TRANSPORT`      | `bearer` |
    /// | `ACCESS_TOKEN_TTL_SECS`  | `3600`   |
    /// | `REFRESH_TOKEN_TTL_DAYS` | `60`     |
    /// | `DATA_DIR`               | `data`   |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map here)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| AuthError::Config("JWT_SECRET must be set".into()))?;
        let mut config = Self::new(secret);

        if let Some(key) = lookup("POLKA_KEY") {
            config.polka_key = key;
        }
        if let Some(platform) = lookup("PLATFORM") {
            config.platform = platform.parse()?;
        }
        if let Some(transport) = lookup("SESSION_TRANSPORT") {
            config.transport = transport.parse()?;
        }
        if let Some(secs) = lookup("ACCESS_TOKEN_TTL_SECS") {
            let secs: u32 = secs
                .trim()
                .parse()
                .map_err(|_| AuthError::Config(format!("ACCESS_TOKEN_TTL_SECS: {secs}")))?;
            config.access_token_ttl = Duration::seconds(i64::from(secs));
        }
        if let Some(days) = lookup("REFRESH_TOKEN_TTL_DAYS") {
            let days: u16 = days
                .trim()
                .parse()
                .map_err(|_| AuthError::Config(format!("REFRESH_TOKEN_TTL_DAYS: {days}")))?;
            config.refresh_token_ttl = Duration::days(i64::from(days));
        }
        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the auth core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(AuthError::Config("JWT secret must not be empty".into()));
        }
        if self.access_token_ttl <= Duration::zero() {
            return Err(AuthError::Config("access token TTL must be positive".into()));
        }
        if self.refresh_token_ttl <= Duration::zero() {
            return Err(AuthError::Config("refresh token TTL must be positive".into()));
        }
        Ok(())
    }

    pub fn with_polka_key(mut self, key: impl Into<String>) -> Self {
        self.polka_key = key.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("polka_key", &"<redacted>")
            .field("platform", &self.platform)
            .field("transport", &self.transport)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}
