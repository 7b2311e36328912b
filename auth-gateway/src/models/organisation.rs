//! Organisation model - the tenant record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{validate_country_codes, validate_language, validate_short_name};

/// Organisation entity.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Organisation {
    pub id: Uuid,
    pub display_name: String,
    pub short_name: String,
    pub country_codes: Vec<String>,
    pub language: String,
    #[serde(skip)]
    pub deactivated: Option<DateTime<Utc>>,
}

impl Organisation {
    pub fn new(req: CreateOrganisationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: req.display_name.trim().to_string(),
            short_name: req.short_name,
            country_codes: req.country_codes,
            language: req.language,
            deactivated: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deactivated.is_none()
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: UpdateOrganisationRequest) {
        if let Some(display_name) = update.display_name {
            self.display_name = display_name.trim().to_string();
        }
        if let Some(country_codes) = update.country_codes {
            self.country_codes = country_codes;
        }
        if let Some(language) = update.language {
            self.language = language;
        }
    }
}

/// Request to create an organisation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrganisationRequest {
    #[validate(length(min = 2, message = "display name must be at least 2 characters"))]
    pub display_name: String,
    #[validate(custom(function = "validate_short_name"))]
    pub short_name: String,
    #[validate(custom(function = "validate_country_codes"))]
    pub country_codes: Vec<String>,
    #[validate(custom(function = "validate_language"))]
    pub language: String,
}

/// Request to update an organisation. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateOrganisationRequest {
    #[validate(length(min = 2, message = "display name must be at least 2 characters"))]
    pub display_name: Option<String>,
    #[validate(custom(function = "validate_country_codes"))]
    pub country_codes: Option<Vec<String>>,
    #[validate(custom(function = "validate_language"))]
    pub language: Option<String>,
}
