//! Server configuration module.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! # Acceptance links
//! FELTTRIP_BASE_URL=https://felttrip.example.com
//!
//! # Provider: Resend
//! FELTTRIP_EMAIL_PROVIDER=resend
//! RESEND_API_KEY=re_...
//!
//! # Provider: SMTP
//! FELTTRIP_EMAIL_PROVIDER=smtp
//! SMTP_HOST=smtp.gmail.com
//! SMTP_PORT=587
//! SMTP_USERNAME=user@example.com
//! SMTP_PASSWORD=app_password
//! SMTP_USE_TLS=true
//!
//! # Sender config
//! FELTTRIP_EMAIL_FROM=noreply@felttrip.example.com
//! FELTTRIP_EMAIL_FROM_NAME="Felttrip"
//!
//! # Rate limits (count per window)
//! FELTTRIP_INVITE_RATE_LIMIT=10
//! FELTTRIP_INVITE_RATE_WINDOW_SECS=3600
//! FELTTRIP_PUBLISH_RATE_LIMIT=120
//! FELTTRIP_PUBLISH_RATE_WINDOW_SECS=60
//! ```

use std::env;
use thiserror::Error;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL for invitation acceptance links.
    pub base_url: String,
    pub email: Option<EmailConfig>,
    pub rate_limits: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            email: None,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

/// Email configuration for invitation delivery
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Email provider configuration
    pub provider: EmailProviderConfig,
    /// From email address
    pub from_address: String,
    /// Optional from name
    pub from_name: Option<String>,
}

/// Email provider configuration
#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    /// Resend email provider
    Resend {
        #[allow(dead_code)] // Used when email-resend feature is enabled
        api_key: String,
    },
    /// SMTP email provider
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        use_tls: bool,
    },
}

/// Fixed-window rate limit tunables.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub invite_limit: u32,
    pub invite_window_secs: u64,
    pub publish_limit: u32,
    pub publish_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            invite_limit: 10,
            invite_window_secs: 3600,
            publish_limit: 120,
            publish_window_secs: 60,
        }
    }
}

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("FELTTRIP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let email = match env::var("FELTTRIP_EMAIL_PROVIDER").ok().as_deref() {
            None => None,
            Some("resend") => {
                let api_key = require("RESEND_API_KEY")?;
                Some(EmailConfig {
                    provider: EmailProviderConfig::Resend { api_key },
                    from_address: require("FELTTRIP_EMAIL_FROM")?,
                    from_name: env::var("FELTTRIP_EMAIL_FROM_NAME").ok(),
                })
            }
            Some("smtp") => {
                let host = require("SMTP_HOST")?;
                let port = parse_var("SMTP_PORT", 587u16)?;
                Some(EmailConfig {
                    provider: EmailProviderConfig::Smtp {
                        host,
                        port,
                        username: env::var("SMTP_USERNAME").ok(),
                        password: env::var("SMTP_PASSWORD").ok(),
                        use_tls: env::var("SMTP_USE_TLS")
                            .map(|v| v == "true" || v == "1")
                            .unwrap_or(true),
                    },
                    from_address: require("FELTTRIP_EMAIL_FROM")?,
                    from_name: env::var("FELTTRIP_EMAIL_FROM_NAME").ok(),
                })
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "FELTTRIP_EMAIL_PROVIDER".to_string(),
                    other.to_string(),
                ))
            }
        };

        let defaults = RateLimitConfig::default();
        let rate_limits = RateLimitConfig {
            invite_limit: parse_var("FELTTRIP_INVITE_RATE_LIMIT", defaults.invite_limit)?,
            invite_window_secs: parse_var(
                "FELTTRIP_INVITE_RATE_WINDOW_SECS",
                defaults.invite_window_secs,
            )?,
            publish_limit: parse_var("FELTTRIP_PUBLISH_RATE_LIMIT", defaults.publish_limit)?,
            publish_window_secs: parse_var(
                "FELTTRIP_PUBLISH_RATE_WINDOW_SECS",
                defaults.publish_window_secs,
            )?,
        };

        Ok(Self {
            base_url,
            email,
            rate_limits,
        })
    }

    /// Acceptance URL for an invitation token:
    /// `{baseUrl}/invite?token={token}`.
    pub fn accept_url(&self, token: &str) -> String {
        format!("{}/invite?token={}", self.base_url.trim_end_matches('/'), token)
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
    }
}
