//! Services layer for the auth gateway.
//!
//! Token codec, credential resolution and the login, invite and reset flows.

mod auth;
pub mod email;
pub mod error;
mod invitation;
pub mod messages;
pub mod metrics;
mod organisation;
pub mod resolver;
pub mod store;
pub mod token;

pub use auth::AuthService;
pub use email::{ConsoleEmailService, EmailProvider, EmailService, MockEmailService, SentEmail};
pub use error::ServiceError;
pub use invitation::IssuedInvite;
pub use messages::Locale;
pub use resolver::{authorize, Access, CredentialResolver, RequestCredentials};
pub use store::{IdentityStore, InMemoryStore, PgIdentityStore};
pub use token::{TokenCodec, TokenError};
