use std::env;
use std::fmt;

use chrono::Duration;
use service_core::config as core_config;
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::token::MAX_LEEWAY_SECONDS;

/// Upper bound for day-based token lifetimes.
pub const MAX_TTL_DAYS: i64 = 3650;
/// Upper bound for the reset token lifetime (one week).
pub const MAX_PASSWORD_RESET_TTL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: Option<DatabaseConfig>,
    pub token: TokenConfig,
    pub api: ApiTokenConfig,
    pub email: EmailConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub auth_token_ttl_days: i64,
    pub invite_ttl_days: i64,
    pub password_reset_ttl_minutes: i64,
    pub leeway_seconds: u64,
}

impl TokenConfig {
    pub fn auth_token_ttl(&self) -> Duration {
        Duration::days(self.auth_token_ttl_days)
    }

    pub fn invite_ttl(&self) -> Duration {
        Duration::days(self.invite_ttl_days)
    }

    pub fn password_reset_ttl(&self) -> Duration {
        Duration::minutes(self.password_reset_ttl_minutes)
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"***")
            .field("auth_token_ttl_days", &self.auth_token_ttl_days)
            .field("invite_ttl_days", &self.invite_ttl_days)
            .field("password_reset_ttl_minutes", &self.password_reset_ttl_minutes)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

#[derive(Clone)]
pub struct ApiTokenConfig {
    /// Accepted `X-API-TOKEN` values.
    pub keys: Vec<String>,
    /// User id the API-token identity acts as.
    pub service_account_id: Uuid,
}

impl fmt::Debug for ApiTokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTokenConfig")
            .field("keys", &format_args!("[{} keys]", self.keys.len()))
            .field("service_account_id", &self.service_account_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Front-end origin used to build invite and reset links.
    pub base_url: String,
    /// Console mailer when absent.
    pub smtp: Option<SmtpConfig>,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_source(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_source<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvSource { lookup };

        let environment: Environment = vars
            .get("ENVIRONMENT", Some("dev"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let database = match vars.optional("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: vars.parse("DATABASE_MIN_CONNECTIONS", "1")?,
            }),
            None if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required in production but not set"
                )))
            }
            None => None,
        };

        let smtp = match vars.optional("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: vars.parse("SMTP_PORT", "587")?,
                username: vars.optional("SMTP_USERNAME"),
                password: vars.optional("SMTP_PASSWORD"),
                from: vars.get("EMAIL_FROM", None, false)?,
            }),
            None => None,
        };

        let api_keys = match vars.optional("API_KEYS") {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("API_KEYS must be a JSON array of strings: {}", e))
            })?,
            None => Vec::new(),
        };

        let config = GatewayConfig {
            common,
            environment,
            service_name: vars.get("SERVICE_NAME", Some("auth-gateway"), false)?,
            service_version: vars.get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: vars.get("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: vars.optional("OTLP_ENDPOINT"),
            database,
            token: TokenConfig {
                secret: vars.get("JWT_SECRET", None, true)?,
                auth_token_ttl_days: vars.parse("AUTH_TOKEN_TTL_DAYS", "30")?,
                invite_ttl_days: vars.parse("INVITE_TTL_DAYS", "7")?,
                password_reset_ttl_minutes: vars.parse("PASSWORD_RESET_TTL_MINUTES", "30")?,
                leeway_seconds: vars.parse("TOKEN_LEEWAY_SECONDS", "0")?,
            },
            api: ApiTokenConfig {
                keys: api_keys,
                service_account_id: vars.parse("API_SERVICE_ACCOUNT_ID", "00000000-0000-0000-0000-000000000000")?,
            },
            email: EmailConfig {
                base_url: vars.get("APP_BASE_URL", Some("http://localhost:3000"), is_prod)?,
                smtp,
            },
            security: SecurityConfig {
                allowed_origins: vars
                    .get("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.token.secret.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        for (key, value, max) in [
            ("AUTH_TOKEN_TTL_DAYS", self.token.auth_token_ttl_days, MAX_TTL_DAYS),
            ("INVITE_TTL_DAYS", self.token.invite_ttl_days, MAX_TTL_DAYS),
            (
                "PASSWORD_RESET_TTL_MINUTES",
                self.token.password_reset_ttl_minutes,
                MAX_PASSWORD_RESET_TTL_MINUTES,
            ),
        ] {
            if value <= 0 {
                return Err(AppError::ConfigError(anyhow::anyhow!("{} must be positive", key)));
            }
            if value > max {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} must not exceed {}",
                    key,
                    max
                )));
            }
        }

        if self.token.leeway_seconds > MAX_LEEWAY_SECONDS {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_LEEWAY_SECONDS must not exceed {}",
                MAX_LEEWAY_SECONDS
            )));
        }

        if self.api.keys.iter().any(|k| k.is_empty()) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "API_KEYS must not contain empty values"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.email.smtp.is_none() {
                tracing::warn!("SMTP_HOST not set in production - invite and reset emails will only be logged");
            }
        }

        Ok(())
    }
}

struct EnvSource<F> {
    lookup: F,
}

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// `required` makes the variable mandatory even when a default exists.
    fn get(&self, key: &str, default: Option<&str>, required: bool) -> Result<String, AppError> {
        match self.optional(key) {
            Some(val) => Ok(val),
            None if required => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
            None => default.map(str::to_string).ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("{} is required but not set", key))
            }),
        }
    }

    fn parse<T>(&self, key: &str, default: &str) -> Result<T, AppError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        self.get(key, Some(default), false)?
            .parse()
            .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
