//! Authentication and session lifecycle
//!
//! Stateless access tokens plus store-backed, revocable refresh tokens,
//! carried by one configured session transport.

pub mod access;
pub mod gate;
pub mod password;
pub mod refresh;
pub mod service;
pub mod transport;

pub use gate::{AccessGate, AuthenticatedUser};
pub use refresh::RefreshTokenManager;
pub use service::SessionService;
pub use transport::{BearerTransport, CookieTransport, SessionTransport};
