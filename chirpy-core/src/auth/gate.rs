//! Auth gate for protected operations
//!
//! Extracts the access token through the active transport and validates it.
//! No state, no store I/O.

use std::sync::Arc;

use http::HeaderMap;
use tracing::debug;
use uuid::Uuid;

use crate::auth::access;
use crate::auth::transport::SessionTransport;
use crate::error::Result;

/// Verified identity handed to protected handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

#[derive(Clone)]
pub struct AccessGate {
    transport: Arc<dyn SessionTransport>,
    secret: Arc<str>,
}

impl AccessGate {
    pub fn new(transport: Arc<dyn SessionTransport>, secret: impl Into<Arc<str>>) -> Self {
        Self {
            transport,
            secret: secret.into(),
        }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser> {
        let token = self.transport.access_token(headers)?;
        access::validate(&token, &self.secret)
            .map(AuthenticatedUser)
            .inspect_err(|e| debug!(error = %e, "Access token rejected"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use http::HeaderValue;
    use http::header::{AUTHORIZATION, COOKIE};

    use super::*;
    use crate::auth::transport::{BearerTransport, CookieTransport};
    use crate::error::AuthError;

    const SECRET: &str = "gate-secret";

    #[test]
    fn test_bearer_gate() {
        let gate = AccessGate::new(Arc::new(BearerTransport), SECRET);
        let user = Uuid::new_v4();
        let token = access::mint(user, SECRET, Duration::hours(1)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        assert_eq!(gate.authenticate(&headers).unwrap(), AuthenticatedUser(user));
    }

    #[test]
    fn test_cookie_gate() {
        let transport = CookieTransport::new(false, Duration::hours(1), Duration::days(60));
        let gate = AccessGate::new(Arc::new(transport), SECRET);
        let user = Uuid::new_v4();
        let token = access::mint(user, SECRET, Duration::hours(1)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("access_token={token}")).unwrap());
        assert_eq!(gate.authenticate(&headers).unwrap().id(), user);
    }

    #[test]
    fn test_rejections() {
        let gate = AccessGate::new(Arc::new(BearerTransport), SECRET);
        assert!(matches!(
            gate.authenticate(&HeaderMap::new()),
            Err(AuthError::MissingCredential(_))
        ));

        let expired = access::mint(Uuid::new_v4(), SECRET, Duration::zero()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {expired}")).unwrap());
        assert!(matches!(gate.authenticate(&headers), Err(AuthError::TokenExpired)));

        let foreign = access::mint(Uuid::new_v4(), "other-secret", Duration::hours(1)).unwrap();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {foreign}")).unwrap());
        assert!(gate.authenticate(&headers).is_err());
    }
}
