//! Session transport — how tokens travel between client and server
//!
//! A deployment picks exactly one [`SessionTransport`] at startup from
//! [`AuthConfig::transport`]:
//!
//! - [`BearerTransport`]: `Authorization: Bearer <token>` in, tokens in the
//!   JSON body out.
//! - [`CookieTransport`]: `access_token` / `refresh_token` cookies both ways,
//!   `HttpOnly` and `SameSite=Lax`, `Secure` in production.
//!
//! The webhook API key (`Authorization: ApiKey <key>`) is independent of the
//! transport and is read by [`extract_api_key`].

use std::sync::Arc;

use chrono::Duration;
use http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::config::{AuthConfig, TransportKind};
use crate::error::{AuthError, Result};
use crate::types::SessionTokens;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Strategy for carrying session tokens
pub trait SessionTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Access token presented with a request
    fn access_token(&self, headers: &HeaderMap) -> Result<String>;

    /// Refresh token presented to refresh, revoke and logout
    fn refresh_token(&self, headers: &HeaderMap) -> Result<String>;

    /// Attach a fresh session to the response. Returns the tokens the JSON
    /// body must carry, if this transport uses the body.
    fn deliver_session(&self, tokens: &SessionTokens, headers: &mut HeaderMap) -> Result<Option<SessionTokens>>;

    /// Attach a refreshed access token. Returns it when the body carries it.
    fn deliver_access(&self, access_token: &str, headers: &mut HeaderMap) -> Result<Option<String>>;

    /// Drop client-held session state after logout or revoke
    fn clear_session(&self, headers: &mut HeaderMap);
}

/// Build the transport selected by the configuration
pub fn from_config(config: &AuthConfig) -> Arc<dyn SessionTransport> {
    match config.transport {
        TransportKind::Bearer => Arc::new(BearerTransport),
        TransportKind::Cookie => Arc::new(CookieTransport::new(
            config.platform.is_production(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        )),
    }
}

// ─── Header Helpers ───

/// Value after `<scheme> ` in the `Authorization` header
fn authorization(headers: &HeaderMap, scheme: &str) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (given, rest) = value.split_once(' ')?;
    if !given.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// `Authorization: Bearer <token>`
pub fn extract_bearer(headers: &HeaderMap) -> Result<String> {
    authorization(headers, "Bearer").ok_or(AuthError::MissingCredential("bearer token"))
}

/// `Authorization: ApiKey <key>`
pub fn extract_api_key(headers: &HeaderMap) -> Result<String> {
    authorization(headers, "ApiKey").ok_or(AuthError::MissingCredential("api key"))
}

/// Value of a named cookie across every `Cookie` header
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ─── Bearer ───

#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTransport;

impl SessionTransport for BearerTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Bearer
    }

    fn access_token(&self, headers: &HeaderMap) -> Result<String> {
        extract_bearer(headers)
    }

    fn refresh_token(&self, headers: &HeaderMap) -> Result<String> {
        extract_bearer(headers)
    }

    fn deliver_session(&self, tokens: &SessionTokens, _headers: &mut HeaderMap) -> Result<Option<SessionTokens>> {
        Ok(Some(tokens.clone()))
    }

    fn deliver_access(&self, access_token: &str, _headers: &mut HeaderMap) -> Result<Option<String>> {
        Ok(Some(access_token.to_string()))
    }

    fn clear_session(&self, _headers: &mut HeaderMap) {}
}

// ─── Cookie ───

#[derive(Debug, Clone)]
pub struct CookieTransport {
    secure: bool,
    access_max_age: Duration,
    refresh_max_age: Duration,
}

impl CookieTransport {
    /// `access_max_age` must be the access token TTL the codec mints with
    pub fn new(secure: bool, access_max_age: Duration, refresh_max_age: Duration) -> Self {
        Self {
            secure,
            access_max_age,
            refresh_max_age,
        }
    }

    fn cookie(&self, name: &str, value: &str, max_age: Duration) -> String {
        let mut cookie = format!(
            "{name}={value}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            max_age.num_seconds().max(0)
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn expired_cookie(&self, name: &str) -> String {
        let mut cookie = format!(
            "{name}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn append(headers: &mut HeaderMap, cookie: String) -> Result<()> {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| AuthError::Internal(format!("invalid Set-Cookie value: {e}")))?;
        headers.append(SET_COOKIE, value);
        Ok(())
    }
}

impl SessionTransport for CookieTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Cookie
    }

    fn access_token(&self, headers: &HeaderMap) -> Result<String> {
        read_cookie(headers, ACCESS_COOKIE).ok_or(AuthError::MissingCredential("access_token cookie"))
    }

    fn refresh_token(&self, headers: &HeaderMap) -> Result<String> {
        read_cookie(headers, REFRESH_COOKIE).ok_or(AuthError::MissingCredential("refresh_token cookie"))
    }

    fn deliver_session(&self, tokens: &SessionTokens, headers: &mut HeaderMap) -> Result<Option<SessionTokens>> {
        Self::append(headers, self.cookie(ACCESS_COOKIE, &tokens.access_token, self.access_max_age))?;
        Self::append(headers, self.cookie(REFRESH_COOKIE, &tokens.refresh_token, self.refresh_max_age))?;
        Ok(None)
    }

    fn deliver_access(&self, access_token: &str, headers: &mut HeaderMap) -> Result<Option<String>> {
        Self::append(headers, self.cookie(ACCESS_COOKIE, access_token, self.access_max_age))?;
        Ok(None)
    }

    fn clear_session(&self, headers: &mut HeaderMap) {
        for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
            if let Ok(value) = HeaderValue::from_str(&self.expired_cookie(name)) {
                headers.append(SET_COOKIE, value);
            }
        }
    }
}
