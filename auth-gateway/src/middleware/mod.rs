pub mod auth;

pub use auth::{auth_middleware, AuthIdentity, API_TOKEN_HEADER};
