//! Data models for the duet push relay.
//!
//! Subscriptions are the only stored records. Payloads, outcomes and
//! summaries exist for the duration of one notify call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription identifier, owned by the store
pub type SubscriptionId = Uuid;

// ============================================================================
// Subscriptions
// ============================================================================

/// One registered browser/device.
///
/// `p256dh` and `auth` are kept base64url-encoded as the browser sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    pub id: SubscriptionId,

    /// Pair this device belongs to
    pub group_id: String,

    /// Member who owns the device
    pub owner_id: String,

    /// Push service capability URL
    pub endpoint: String,

    /// Browser public key (uncompressed P-256, base64url)
    pub p256dh: String,

    /// 16-byte auth secret (base64url)
    pub auth: String,

    pub user_agent: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Subscription as submitted for registration
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub group_id: String,
    pub owner_id: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
}

// ============================================================================
// Notification payload
// ============================================================================

/// JSON body the service worker receives after decryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Deep link opened on click
    pub url: String,
    /// Grouping key; a newer notification with the same tag replaces the older one
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

/// Deployment-wide values filled into every payload
#[derive(Debug, Clone)]
pub struct PayloadDefaults {
    pub title: String,
    pub icon: String,
    pub badge: String,
}

impl Default for PayloadDefaults {
    fn default() -> Self {
        Self {
            title: "Our Journey 💕".to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/icon-96x96.png".to_string(),
        }
    }
}

impl NotificationPayload {
    /// Build the payload for a notify request.
    ///
    /// Empty strings count as absent. The tag falls back to the
    /// notification type, then to `general`.
    pub fn from_request(req: &NotifyRequest, defaults: &PayloadDefaults) -> Self {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.is_empty())
        }

        Self {
            title: present(&req.title).unwrap_or(defaults.title.as_str()).to_string(),
            body: present(&req.body).unwrap_or("").to_string(),
            url: present(&req.url).unwrap_or("/").to_string(),
            tag: present(&req.tag)
                .or_else(|| present(&req.kind))
                .unwrap_or("general")
                .to_string(),
            icon: Some(defaults.icon.clone()),
            badge: Some(defaults.badge.clone()),
        }
    }
}

// ============================================================================
// Delivery results
// ============================================================================

/// Result of one delivery attempt to one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub subscription_id: SubscriptionId,
    pub delivered: bool,
    /// Push service status; `None` when no response was received
    pub http_status: Option<u16>,
    /// Push service reported the endpoint gone (404/410)
    pub should_prune: bool,
}

impl DeliveryOutcome {
    pub fn delivered(subscription_id: SubscriptionId, status: u16) -> Self {
        Self {
            subscription_id,
            delivered: true,
            http_status: Some(status),
            should_prune: false,
        }
    }

    pub fn failed(subscription_id: SubscriptionId, status: Option<u16>) -> Self {
        Self {
            subscription_id,
            delivered: false,
            http_status: status,
            should_prune: false,
        }
    }

    pub fn gone(subscription_id: SubscriptionId, status: u16) -> Self {
        Self {
            subscription_id,
            delivered: false,
            http_status: Some(status),
            should_prune: true,
        }
    }
}

/// Aggregate counts returned to the caller; `sent + failed == total`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySummary {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

impl DeliverySummary {
    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        let sent = outcomes.iter().filter(|o| o.delivered).count();
        Self {
            sent,
            failed: outcomes.len() - sent,
            total: outcomes.len(),
        }
    }
}

// === API Request/Response Models ===

/// Keys object exactly as `PushSubscription.toJSON()` produces it
#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Register or refresh a browser subscription
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub group_id: String,
    pub owner_id: String,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Subscribe response
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub id: SubscriptionId,
    pub success: bool,
}

/// Remove one of the caller's own subscriptions
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub owner_id: String,
    pub endpoint: String,
}

/// Unsubscribe response
#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub removed: bool,
}

/// Notify the other member(s) of a group
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub group_id: String,
    pub sender_id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// VAPID public key for the browser's `applicationServerKey`
#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub public_key: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}
