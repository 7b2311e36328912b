use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::{Validate, ValidationError};

use crate::services::ServiceError;

/// JSON body extractor that runs `validator` rules before the handler sees it.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;

        value
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Non-empty list of ISO 3166-1 alpha-3 codes, e.g. `GBR`.
pub fn validate_country_codes(codes: &Vec<String>) -> Result<(), ValidationError> {
    if codes.is_empty() {
        return Err(invalid("country_codes", "at least one country code is required"));
    }
    let well_formed = codes
        .iter()
        .all(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_uppercase()));
    if !well_formed {
        return Err(invalid("country_codes", "country codes must be three upper-case letters"));
    }
    Ok(())
}

/// ISO 639-1 language code, e.g. `en`.
pub fn validate_language(language: &str) -> Result<(), ValidationError> {
    if language.len() == 2 && language.chars().all(|ch| ch.is_ascii_lowercase()) {
        Ok(())
    } else {
        Err(invalid("language", "language must be two lower-case letters"))
    }
}

/// URL-safe organisation handle: lower-case letters, digits and hyphens.
pub fn validate_short_name(short_name: &str) -> Result<(), ValidationError> {
    let well_formed = short_name.len() >= 2
        && short_name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
    if well_formed {
        Ok(())
    } else {
        Err(invalid(
            "short_name",
            "short name must be at least 2 characters of a-z, 0-9 or '-'",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_codes() {
        assert!(validate_country_codes(&vec!["GBR".into(), "IRL".into()]).is_ok());
        assert!(validate_country_codes(&vec![]).is_err());
        assert!(validate_country_codes(&vec!["GB".into()]).is_err());
        assert!(validate_country_codes(&vec!["gbr".into()]).is_err());
    }

    #[test]
    fn test_language() {
        assert!(validate_language("en").is_ok());
        assert!(validate_language("EN").is_err());
        assert!(validate_language("eng").is_err());
    }

    #[test]
    fn test_short_name() {
        assert!(validate_short_name("full-fact-2").is_ok());
        assert!(validate_short_name("a").is_err());
        assert!(validate_short_name("Full").is_err());
        assert!(validate_short_name("full_fact").is_err());
    }
}
