// Server-side settings: listen port, store backend, CORS origin

use std::str::FromStr;

use anyhow::{Context, bail};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Which credential/chirp store the server opens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Delta,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" => Ok(Self::Delta),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown CHIRPY_STORE '{other}' (expected delta or memory)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub store: StoreKind,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store: StoreKind::default(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or blank variables fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = var("PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{port}'"))?;
        }
        if let Some(store) = var("CHIRPY_STORE") {
            config.store = store.parse()?;
        }
        if let Some(origin) = var("CORS_ORIGIN") {
            config.cors_origin = origin.trim().to_string();
        }
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
