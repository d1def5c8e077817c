//! Route handlers, one module per resource

pub mod admin;
pub mod chirps;
pub mod health;
pub mod polka;
pub mod session;
pub mod users;
