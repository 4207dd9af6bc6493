//! Delivery orchestration.
//!
//! For one notify call: resolve the recipient's subscriptions, run
//! encrypt → sign → dispatch for each of them with bounded concurrency,
//! prune the ones the push service reports gone, and count the results.
//!
//! Failures are isolated per subscription. Only the initial store lookup
//! can fail the whole call; every subscription it returns ends up in the
//! summary exactly once.

use crate::dispatch::{Disposition, DispatchResult, PushDispatcher, Urgency};
use crate::models::{DeliveryOutcome, DeliverySummary, NotificationPayload, PushSubscription};
use crate::store::{StoreError, SubscriptionStore};
use chrono::Utc;
use duet_core::{RecipientKeys, VapidIdentity};
use futures::stream::{self, StreamExt};
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delivery tuning, from configuration
#[derive(Debug, Clone, Copy)]
pub struct DeliveryOptions {
    /// `TTL` header value
    pub ttl: Duration,
    pub urgency: Urgency,
    /// Per-request timeout
    pub timeout: Duration,
    /// Upper bound on in-flight subscriptions
    pub max_concurrency: usize,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86_400),
            urgency: Urgency::High,
            timeout: Duration::from_secs(10),
            max_concurrency: 16,
        }
    }
}

/// Per-subscription outcomes plus their aggregate
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub summary: DeliverySummary,
    pub outcomes: Vec<DeliveryOutcome>,
}

/// Fans one notification out to every device of the other member(s) of a group
pub struct Deliverer {
    store: Arc<dyn SubscriptionStore>,
    identity: Arc<VapidIdentity>,
    dispatcher: PushDispatcher,
    max_concurrency: usize,
}

impl Deliverer {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        identity: Arc<VapidIdentity>,
        options: DeliveryOptions,
    ) -> Result<Self, DeliveryError> {
        let dispatcher = PushDispatcher::new(options.ttl, options.urgency, options.timeout)
            .map_err(DeliveryError::HttpClient)?;

        Ok(Self {
            store,
            identity,
            dispatcher,
            max_concurrency: options.max_concurrency.max(1),
        })
    }

    /// Deliver `payload` to all subscriptions in `group_id` except the sender's.
    ///
    /// An empty target set is a successful no-op.
    pub async fn deliver(
        &self,
        group_id: &str,
        exclude_owner_id: &str,
        payload: &NotificationPayload,
    ) -> Result<DeliverySummary, DeliveryError> {
        Ok(self
            .deliver_report(group_id, exclude_owner_id, payload)
            .await?
            .summary)
    }

    /// Like [`Deliverer::deliver`], keeping each subscription's outcome.
    pub async fn deliver_report(
        &self,
        group_id: &str,
        exclude_owner_id: &str,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReport, DeliveryError> {
        let subscriptions = self
            .store
            .find_for_group(group_id, exclude_owner_id)
            .await
            .map_err(DeliveryError::Store)?;

        if subscriptions.is_empty() {
            debug!("No subscriptions for recipient");
            return Ok(DeliveryReport::default());
        }

        let plaintext = serde_json::to_vec(payload).map_err(DeliveryError::Payload)?;
        let now = Utc::now().timestamp().max(0) as u64;

        info!(
            tag = %payload.tag,
            total = subscriptions.len(),
            "Sending notification"
        );

        let outcomes: Vec<DeliveryOutcome> = stream::iter(subscriptions)
            .map(|subscription| self.deliver_one(subscription, &plaintext, now))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let summary = DeliverySummary::from_outcomes(&outcomes);
        info!(
            sent = summary.sent,
            failed = summary.failed,
            total = summary.total,
            "Notification delivery finished"
        );

        Ok(DeliveryReport { summary, outcomes })
    }

    async fn deliver_one(
        &self,
        subscription: PushSubscription,
        plaintext: &[u8],
        now: u64,
    ) -> DeliveryOutcome {
        let id = subscription.id;

        let (authorization, body) = match self.prepare(&subscription, plaintext, now) {
            Ok(prepared) => prepared,
            Err(e) => {
                // Left in the store: bad key material is not a dead endpoint
                warn!(subscription_id = %id, error = %e, "Skipping subscription");
                return DeliveryOutcome::failed(id, None);
            }
        };

        match self
            .dispatcher
            .send(&subscription.endpoint, &authorization, body)
            .await
        {
            DispatchResult::Response {
                status,
                disposition: Disposition::Delivered,
            } => DeliveryOutcome::delivered(id, status),
            DispatchResult::Response {
                status,
                disposition: Disposition::Gone,
            } => {
                self.prune(id, status).await;
                DeliveryOutcome::gone(id, status)
            }
            DispatchResult::Response {
                status,
                disposition: Disposition::Rejected,
            } => DeliveryOutcome::failed(id, Some(status)),
            DispatchResult::Transport => DeliveryOutcome::failed(id, None),
        }
    }

    /// Encrypt for this subscription and sign for its push service.
    fn prepare(
        &self,
        subscription: &PushSubscription,
        plaintext: &[u8],
        now: u64,
    ) -> duet_core::Result<(String, Vec<u8>)> {
        let keys = RecipientKeys::from_base64url(&subscription.p256dh, &subscription.auth)?;
        let body = duet_core::encrypt(plaintext, &keys, &mut OsRng)?;
        let audience = duet_core::audience(&subscription.endpoint)?;
        let authorization = self.identity.authorization(&audience, now)?;
        Ok((authorization, body))
    }

    async fn prune(&self, id: uuid::Uuid, status: u16) {
        match self.store.delete(id).await {
            Ok(true) => info!(subscription_id = %id, status, "Removed expired subscription"),
            Ok(false) => debug!(subscription_id = %id, "Expired subscription already removed"),
            Err(e) => warn!(
                subscription_id = %id,
                error = %e,
                "Failed to remove expired subscription"
            ),
        }
    }
}

/// Errors that fail a whole delivery call
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscription lookup failed: {0}")]
    Store(#[source] StoreError),

    #[error("payload serialization failed: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}
