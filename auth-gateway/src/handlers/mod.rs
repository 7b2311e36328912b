//! HTTP handlers for the auth gateway.

pub mod auth;
pub mod metrics;
pub mod organisation;
pub mod user;

pub use auth::*;
pub use organisation::*;
pub use user::*;
