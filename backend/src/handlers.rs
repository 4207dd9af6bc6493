//! HTTP request handlers for the duet push relay API.
//!
//! All handlers follow the contract:
//! - Subscriptions are validated before they are stored
//! - Notify is best-effort; per-device failures only show up in the counts
//! - Minimal logging (no endpoints in full, no key material)

use crate::auth::{ApiToken, AuthError};
use crate::delivery::{Deliverer, DeliveryError};
use crate::models::*;
use crate::store::{StoreError, SubscriptionStore};
use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use duet_core::{RecipientKeys, VapidIdentity};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Longest accepted group or owner id
const MAX_ID_LEN: usize = 128;

/// Longest accepted endpoint URL
const MAX_ENDPOINT_LEN: usize = 2048;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub deliverer: Arc<Deliverer>,
    pub identity: Arc<VapidIdentity>,
    /// Bearer token for `/v1/*`
    pub api_token: ApiToken,
    pub defaults: Arc<PayloadDefaults>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        deliverer: Arc<Deliverer>,
        identity: Arc<VapidIdentity>,
        api_token: ApiToken,
        defaults: PayloadDefaults,
    ) -> Self {
        Self {
            store,
            deliverer,
            identity,
            api_token,
            defaults: Arc::new(defaults),
        }
    }
}

// === Health Check ===

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === VAPID Public Key ===

/// GET /v1/push/public-key - Key for the browser's `applicationServerKey`
///
/// Public by nature; never behind the API token.
pub async fn public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: state.identity.public_key_base64url(),
    })
}

// === Subscriptions ===

/// POST /v1/subscriptions - Register or refresh a browser subscription
///
/// Keys are held to the same checks delivery applies, so a subscription
/// that could never be encrypted for is refused here with 400.
pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>), ApiError> {
    state.api_token.verify(&headers)?;

    validate_id(&req.group_id, "invalid group_id")?;
    validate_id(&req.owner_id, "invalid owner_id")?;
    validate_endpoint(&req.endpoint)?;

    if let Err(e) = RecipientKeys::from_base64url(&req.keys.p256dh, &req.keys.auth) {
        debug!(error = %e, "Rejected subscription keys");
        return Err(ApiError::InvalidKeys);
    }

    let subscription = state
        .store
        .upsert(NewSubscription {
            group_id: req.group_id,
            owner_id: req.owner_id,
            endpoint: req.endpoint,
            p256dh: req.keys.p256dh,
            auth: req.keys.auth,
            user_agent: req.user_agent,
        })
        .await?;

    info!(subscription_id = %subscription.id, "Subscription registered");

    Ok((
        StatusCode::CREATED,
        Json(SubscribeResponse {
            id: subscription.id,
            success: true,
        }),
    ))
}

/// DELETE /v1/subscriptions - Remove one of the caller's subscriptions
///
/// Idempotent: removing an unknown endpoint answers `removed: false`.
pub async fn unsubscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    state.api_token.verify(&headers)?;

    validate_id(&req.owner_id, "invalid owner_id")?;
    if req.endpoint.is_empty() {
        return Err(ApiError::InvalidInput("invalid endpoint"));
    }

    let removed = state
        .store
        .delete_by_endpoint(&req.owner_id, &req.endpoint)
        .await?;

    Ok(Json(UnsubscribeResponse { removed }))
}

// === Notify ===

/// POST /v1/notify - Push a notification to the other member(s) of a group
///
/// Returns the delivery counts; zero targets is a 200 with zeros.
pub async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<DeliverySummary>, ApiError> {
    state.api_token.verify(&headers)?;

    validate_id(&req.group_id, "invalid group_id")?;
    validate_id(&req.sender_id, "invalid sender_id")?;

    let payload = NotificationPayload::from_request(&req, &state.defaults);

    let summary = state
        .deliverer
        .deliver(&req.group_id, &req.sender_id, &payload)
        .await
        .map_err(|e| {
            error!(error = %e, "Notify failed");
            ApiError::from(e)
        })?;

    Ok(Json(summary))
}

// === Validation ===

fn validate_id(value: &str, message: &'static str) -> Result<(), ApiError> {
    if value.is_empty() || value.len() > MAX_ID_LEN {
        return Err(ApiError::InvalidInput(message));
    }
    Ok(())
}

/// Endpoints must be absolute https URLs we can derive an audience from.
fn validate_endpoint(endpoint: &str) -> Result<(), ApiError> {
    if endpoint.len() > MAX_ENDPOINT_LEN || !endpoint.starts_with("https://") {
        return Err(ApiError::InvalidInput("invalid endpoint"));
    }
    duet_core::audience(endpoint).map_err(|_| ApiError::InvalidInput("invalid endpoint"))?;
    Ok(())
}

// === Error Handling ===

/// API error types
#[derive(Debug)]
pub enum ApiError {
    InvalidInput(&'static str),
    /// Subscription keys fail validation
    InvalidKeys,
    /// Store unavailable
    Internal,
    /// Authorization error (wraps AuthError)
    Auth(AuthError),
}

/// Implement From<AuthError> to enable ? operator in handlers
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        warn!(error = %err, "Store operation failed");
        ApiError::Internal
    }
}

impl From<DeliveryError> for ApiError {
    fn from(_: DeliveryError) -> Self {
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::Auth(auth_err) => return auth_err.into_response(),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            ApiError::InvalidKeys => (
                StatusCode::BAD_REQUEST,
                "INVALID_KEYS",
                "subscription keys are malformed",
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error",
            ),
        };

        let body = Json(ErrorResponse {
            error: message.to_string(),
            code,
        });

        (status, body).into_response()
    }
}
