//! Access token codec — HS256 JWTs bound to a user id
//!
//! Verification is a pure function of the token and the signing secret: the
//! credential store is never touched, so every authenticated request stays
//! off the database. Expiry, issuer and subject are checked here rather than
//! by `jsonwebtoken` so each failure keeps its own error.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// Issuer tag carried by every access token
pub const ISSUER: &str = "chirpy-access";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mint an access token for `user_id` valid for `ttl` from now
pub fn mint(user_id: Uuid, secret: &str, ttl: Duration) -> Result<String> {
    mint_at(user_id, secret, ttl, Utc::now())
}

/// [`mint`] against an explicit clock
pub fn mint_at(user_id: Uuid, secret: &str, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
    let claims = AccessClaims {
        iss: ISSUER.to_string(),
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("failed to sign access token: {e}")))
}

/// Verify an access token and return the user it was minted for
pub fn validate(token: &str, secret: &str) -> Result<Uuid> {
    validate_at(token, secret, Utc::now())
}

/// [`validate`] against an explicit clock. A token is valid while `now < exp`.
pub fn validate_at(token: &str, secret: &str, now: DateTime<Utc>) -> Result<Uuid> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);

    let claims = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?
    .claims;

    if now.timestamp() >= claims.exp {
        return Err(AuthError::TokenExpired);
    }
    if claims.iss != ISSUER {
        return Err(AuthError::WrongIssuer(claims.iss));
    }
    Uuid::parse_str(&claims.sub).map_err(|_| AuthError::MalformedSubject(claims.sub))
}
