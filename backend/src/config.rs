//! Configuration for the duet push relay.
//!
//! All configuration is loaded once from environment variables at startup.
//! Key material is validated before the server binds; a deployment that
//! cannot sign is refused rather than started. No secrets are logged.

use crate::delivery::DeliveryOptions;
use crate::dispatch::Urgency;
use crate::models::PayloadDefaults;
use duet_core::VapidIdentity;
use std::str::FromStr;
use std::time::Duration;

/// Default contact URI when `VAPID_SUBJECT` is unset.
pub const DEFAULT_SUBJECT: &str = "mailto:admin@localhost";

/// Server configuration
#[derive(Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    // === VAPID ===
    /// base64url raw private scalar
    pub vapid_private_key: Option<String>,

    /// base64url uncompressed public point, checked against the private key
    pub vapid_public_key: Option<String>,

    /// Contact URI (`mailto:` or `https:`)
    pub vapid_subject: String,

    // === Delivery ===
    /// `TTL` header sent to push services (default: 24 hours)
    pub push_ttl: Duration,

    /// `Urgency` header (default: high)
    pub push_urgency: Urgency,

    /// Per-request timeout towards a push service (default: 10 seconds)
    pub push_timeout: Duration,

    /// Maximum in-flight deliveries per notify call (default: 16)
    pub push_max_concurrency: usize,

    // === API ===
    /// Shared bearer token for `/v1/*`; unset disables the check
    pub api_token: Option<String>,

    // === Notification defaults ===
    pub default_title: String,
    pub notification_icon: String,
    pub notification_badge: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 8080),

            vapid_private_key: env_non_empty("VAPID_PRIVATE_KEY"),
            vapid_public_key: env_non_empty("VAPID_PUBLIC_KEY"),
            vapid_subject: env_non_empty("VAPID_SUBJECT")
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),

            push_ttl: Duration::from_secs(env_parse("PUSH_TTL_SECS", 86_400)),
            push_urgency: env_parse("PUSH_URGENCY", Urgency::High),
            push_timeout: Duration::from_secs(env_parse("PUSH_TIMEOUT_SECS", 10)),
            push_max_concurrency: env_parse("PUSH_MAX_CONCURRENCY", 16_usize).max(1),

            api_token: env_non_empty("API_TOKEN"),

            default_title: env_non_empty("DEFAULT_TITLE")
                .unwrap_or_else(|| "Our Journey 💕".to_string()),
            notification_icon: env_non_empty("NOTIFICATION_ICON")
                .unwrap_or_else(|| "/icon-192x192.png".to_string()),
            notification_badge: env_non_empty("NOTIFICATION_BADGE")
                .unwrap_or_else(|| "/icon-96x96.png".to_string()),
        }
    }

    /// Build the deployment's signing identity.
    ///
    /// Any failure here is fatal at startup.
    pub fn vapid_identity(&self) -> Result<VapidIdentity, ConfigError> {
        let private_key = self
            .vapid_private_key
            .as_deref()
            .ok_or(ConfigError::MissingVapidKey)?;

        if !(self.vapid_subject.starts_with("mailto:") || self.vapid_subject.starts_with("https:"))
        {
            return Err(ConfigError::InvalidSubject(self.vapid_subject.clone()));
        }

        VapidIdentity::from_base64url(
            private_key,
            self.vapid_public_key.as_deref(),
            self.vapid_subject.clone(),
        )
        .map_err(ConfigError::InvalidVapidKey)
    }

    pub fn delivery_options(&self) -> DeliveryOptions {
        DeliveryOptions {
            ttl: self.push_ttl,
            urgency: self.push_urgency,
            timeout: self.push_timeout,
            max_concurrency: self.push_max_concurrency,
        }
    }

    pub fn payload_defaults(&self) -> PayloadDefaults {
        PayloadDefaults {
            title: self.default_title.clone(),
            icon: self.notification_icon.clone(),
            badge: self.notification_badge.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

// Secrets stay out of Debug output
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("vapid_private_key", &self.vapid_private_key.as_ref().map(|_| "<set>"))
            .field("vapid_public_key", &self.vapid_public_key)
            .field("vapid_subject", &self.vapid_subject)
            .field("push_ttl", &self.push_ttl)
            .field("push_urgency", &self.push_urgency)
            .field("push_timeout", &self.push_timeout)
            .field("push_max_concurrency", &self.push_max_concurrency)
            .field("api_token", &self.api_token.as_ref().map(|_| "<set>"))
            .field("default_title", &self.default_title)
            .finish_non_exhaustive()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Startup configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("VAPID_PRIVATE_KEY is not set (generate one with `vapid-keygen`)")]
    MissingVapidKey,

    #[error("invalid VAPID key material: {0}")]
    InvalidVapidKey(#[source] duet_core::Error),

    #[error("VAPID_SUBJECT must be a mailto: or https: URI, got {0:?}")]
    InvalidSubject(String),
}
