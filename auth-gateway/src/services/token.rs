use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::models::Claims;

/// Largest clock skew tolerance accepted from configuration.
pub const MAX_LEEWAY_SECONDS: u64 = 60;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Token malformed")]
    Malformed,

    #[error("Token signature mismatch")]
    SignatureMismatch,
}

impl TokenError {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Expired => "expired",
            TokenError::Malformed => "malformed",
            TokenError::SignatureMismatch => "signature_mismatch",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies claim sets with a deployment-wide HS256 secret.
///
/// Rotating the secret invalidates every outstanding token at once; there is
/// no per-token revocation.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    leeway_seconds: i64,
}

impl TokenCodec {
    /// Create a codec from the shared secret.
    ///
    /// `leeway_seconds` is the tolerated clock skew on expiry and must not
    /// exceed [`MAX_LEEWAY_SECONDS`].
    pub fn new(secret: &str, leeway_seconds: u64) -> Result<Self, anyhow::Error> {
        if secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }
        if leeway_seconds > MAX_LEEWAY_SECONDS {
            anyhow::bail!(
                "Token leeway of {}s exceeds the maximum of {}s",
                leeway_seconds,
                MAX_LEEWAY_SECONDS
            );
        }

        // Expiry is checked against an injectable clock in `validate_at`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        tracing::info!(leeway_seconds, "Token codec initialized with HS256 secret");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            leeway_seconds: leeway_seconds as i64,
        })
    }

    /// Sign a claim set.
    pub fn mint(&self, claims: &Claims) -> Result<String, anyhow::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    /// Verify signature and expiry against the current time.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Verify signature and expiry against `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        if now.timestamp() > claims.exp + self.leeway_seconds {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
