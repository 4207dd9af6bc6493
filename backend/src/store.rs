//! Subscription store.
//!
//! The relay only ever needs four operations on subscriptions, expressed
//! by [`SubscriptionStore`]. [`MemoryStore`] keeps everything in RAM;
//! data is lost on restart.

use crate::models::*;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Keyed collection of push targets, read by delivery and pruned on 404/410.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert, or refresh the row with the same endpoint (its id is kept).
    async fn upsert(&self, new: NewSubscription) -> Result<PushSubscription, StoreError>;

    /// All subscriptions in `group_id` not owned by `exclude_owner_id`.
    async fn find_for_group(
        &self,
        group_id: &str,
        exclude_owner_id: &str,
    ) -> Result<Vec<PushSubscription>, StoreError>;

    /// Delete by id. `false` if it was already gone.
    async fn delete(&self, id: SubscriptionId) -> Result<bool, StoreError>;

    /// Delete the owner's subscription for `endpoint`.
    async fn delete_by_endpoint(&self, owner_id: &str, endpoint: &str)
        -> Result<bool, StoreError>;
}

/// Thread-safe in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Subscriptions by id
    subscriptions: Arc<DashMap<SubscriptionId, PushSubscription>>,

    /// Endpoint -> id index; an endpoint is registered at most once
    by_endpoint: Arc<DashMap<String, SubscriptionId>>,

    /// Metrics (aggregate only, no PII)
    metrics: Arc<RwLock<StoreMetrics>>,
}

/// Aggregate metrics (no PII, no per-group data)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetrics {
    pub total_registrations: u64,
    pub total_unsubscribes: u64,
    pub total_pruned: u64,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Look up one subscription
    pub fn get(&self, id: SubscriptionId) -> Option<PushSubscription> {
        self.subscriptions.get(&id).map(|entry| entry.value().clone())
    }

    /// Get aggregate metrics (no PII)
    pub async fn get_metrics(&self) -> StoreMetrics {
        *self.metrics.read().await
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn upsert(&self, new: NewSubscription) -> Result<PushSubscription, StoreError> {
        let now = Utc::now();

        // Endpoint shard stays locked until the row is written
        let subscription = {
            let index = self
                .by_endpoint
                .entry(new.endpoint.clone())
                .or_insert_with(Uuid::new_v4);
            let id = *index;

            let created_at = self
                .subscriptions
                .get(&id)
                .map(|existing| existing.created_at)
                .unwrap_or(now);

            let subscription = PushSubscription {
                id,
                group_id: new.group_id,
                owner_id: new.owner_id,
                endpoint: new.endpoint,
                p256dh: new.p256dh,
                auth: new.auth,
                user_agent: new.user_agent,
                created_at,
                updated_at: now,
            };
            self.subscriptions.insert(id, subscription.clone());
            subscription
        };

        self.metrics.write().await.total_registrations += 1;
        debug!(subscription_id = %subscription.id, "Registered push subscription");

        Ok(subscription)
    }

    async fn find_for_group(
        &self,
        group_id: &str,
        exclude_owner_id: &str,
    ) -> Result<Vec<PushSubscription>, StoreError> {
        let mut found: Vec<PushSubscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.group_id == group_id && entry.owner_id != exclude_owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }

    async fn delete(&self, id: SubscriptionId) -> Result<bool, StoreError> {
        let Some(endpoint) = self.subscriptions.get(&id).map(|s| s.endpoint.clone()) else {
            return Ok(false);
        };

        // Index shard locked before the row, as in upsert
        let removed = self.by_endpoint.remove_if(&endpoint, |_, indexed| {
            *indexed == id && self.subscriptions.remove(&id).is_some()
        });
        if removed.is_none() {
            return Ok(false);
        }

        self.metrics.write().await.total_pruned += 1;
        Ok(true)
    }

    async fn delete_by_endpoint(
        &self,
        owner_id: &str,
        endpoint: &str,
    ) -> Result<bool, StoreError> {
        let removed = self.by_endpoint.remove_if(endpoint, |_, id| {
            self.subscriptions
                .get(id)
                .map(|s| s.owner_id == owner_id)
                .unwrap_or(false)
        });
        let Some((_, id)) = removed else {
            return Ok(false);
        };
        self.subscriptions.remove(&id);

        self.metrics.write().await.total_unsubscribes += 1;
        debug!(subscription_id = %id, "Removed push subscription");
        Ok(true)
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("subscription store unavailable: {0}")]
    Unavailable(String),
}
