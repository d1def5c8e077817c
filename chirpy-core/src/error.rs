//! Error types for chirpy-core — Railway Programming
//!
//! All operations return `Result<T, AuthError>`. Component failures keep their
//! own variant so logs stay precise; [`AuthError::kind`] folds them into the
//! small client-facing taxonomy that the HTTP layer renders.

use http::StatusCode;
use thiserror::Error;

/// Unified error type for every auth, session and store operation
#[derive(Error, Debug)]
pub enum AuthError {
    // ─── Credential Store Errors ───

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Chirp not found: {0}")]
    ChirpNotFound(String),

    #[error("Refresh token not found")]
    RefreshTokenNotFound,

    #[error("Refresh token revoked")]
    RefreshTokenRevoked,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Persistence failure: {0}")]
    Persistence(String),

    // ─── Password Hasher Errors ───

    #[error("Password hashing failed: {0}")]
    HashingFailure(String),

    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    // ─── Access Token Errors ───

    #[error("Access token expired")]
    TokenExpired,

    #[error("Access token issuer mismatch: {0}")]
    WrongIssuer(String),

    #[error("Access token subject is not a user id: {0}")]
    MalformedSubject(String),

    #[error("Access token invalid: {0}")]
    TokenInvalid(String),

    // ─── Request / Flow Errors ───

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("{0}")]
    MalformedRequest(String),

    #[error("Password too weak: {0}")]
    PasswordTooWeak(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ─── Infrastructure Errors ───

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Actor unavailable: {0}")]
    ActorUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Client-facing error taxonomy. Each kind maps to exactly one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedRequest,
    InvalidCredentials,
    DuplicateEmail,
    Unauthenticated,
    TokenRevokedOrExpired,
    NotFound,
    Forbidden,
    UpstreamFailure,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::MalformedRequest => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::TokenRevokedOrExpired => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UpstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Fixed message for this kind, safe to show to any client
    pub fn default_message(self) -> &'static str {
        match self {
            Self::MalformedRequest => "Malformed request",
            Self::InvalidCredentials => "Incorrect email or password",
            Self::DuplicateEmail => "User with this email already exists",
            Self::Unauthenticated => "Invalid authentication token",
            Self::TokenRevokedOrExpired => "Refresh token is revoked or expired",
            Self::NotFound => "Resource not found",
            Self::Forbidden => "You are not allowed to perform this action",
            Self::UpstreamFailure => "Something went wrong",
        }
    }
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedRequest(_) | Self::PasswordTooWeak(_) => ErrorKind::MalformedRequest,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::DuplicateEmail(_) => ErrorKind::DuplicateEmail,
            Self::TokenExpired
            | Self::WrongIssuer(_)
            | Self::MalformedSubject(_)
            | Self::TokenInvalid(_)
            | Self::MissingCredential(_)
            | Self::InvalidApiKey => ErrorKind::Unauthenticated,
            Self::RefreshTokenNotFound | Self::RefreshTokenRevoked | Self::RefreshTokenExpired => {
                ErrorKind::TokenRevokedOrExpired
            }
            Self::UserNotFound(_) | Self::ChirpNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Persistence(_)
            | Self::HashingFailure(_)
            | Self::MalformedHash(_)
            | Self::Config(_)
            | Self::ActorUnavailable(_)
            | Self::Internal(_) => ErrorKind::UpstreamFailure,
        }
    }

    /// Message rendered to clients. Only input-validation errors carry their
    /// own text; everything else uses the kind's fixed message.
    pub fn public_message(&self) -> String {
        match self {
            Self::MalformedRequest(reason) | Self::PasswordTooWeak(reason) => reason.clone(),
            other => other.kind().default_message().to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthError::TokenInvalid(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::Persistence(err.to_string())
    }
}

#[cfg(feature = "delta")]
impl From<deltalake::DeltaTableError> for AuthError {
    fn from(err: deltalake::DeltaTableError) -> Self {
        AuthError::Persistence(format!("delta: {err}"))
    }
}

#[cfg(feature = "delta")]
impl From<deltalake::arrow::error::ArrowError> for AuthError {
    fn from(err: deltalake::arrow::error::ArrowError) -> Self {
        AuthError::Persistence(format!("arrow: {err}"))
    }
}

#[cfg(feature = "delta")]
impl From<deltalake::datafusion::error::DataFusionError> for AuthError {
    fn from(err: deltalake::datafusion::error::DataFusionError) -> Self {
        AuthError::Persistence(format!("datafusion: {err}"))
    }
}

#[cfg(feature = "delta")]
impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::Config(format!("URL parse error: {err}"))
    }
}

/// Result type alias for chirpy-core operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failures_share_one_message() {
        let unknown = AuthError::InvalidCredentials;
        assert_eq!(unknown.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(unknown.kind().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.public_message(), "Incorrect email or password");
    }

    #[test]
    fn internal_detail_is_not_public() {
        let err = AuthError::Persistence("disk /var/lib/chirpy full".into());
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
        assert!(!err.public_message().contains("/var/lib"));
    }

    #[test]
    fn duplicate_email_is_distinct_from_persistence() {
        assert_eq!(
            AuthError::DuplicateEmail("a@b.com".into()).kind().status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::Persistence("write failed".into()).kind().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn refresh_token_failures_map_to_revoked_or_expired() {
        for err in [
            AuthError::RefreshTokenNotFound,
            AuthError::RefreshTokenRevoked,
            AuthError::RefreshTokenExpired,
        ] {
            assert_eq!(err.kind(), ErrorKind::TokenRevokedOrExpired);
        }
    }

    #[test]
    fn validation_errors_keep_their_reason() {
        let err = AuthError::MalformedRequest("Chirp is too long".into());
        assert_eq!(err.public_message(), "Chirp is too long");
        assert_eq!(err.kind().status_code(), StatusCode::BAD_REQUEST);
    }
}
