//! # Duet Backend
//!
//! Web Push relay for a two-person app: when one member does something,
//! every registered device of the other member gets an encrypted push.
//!
//! ## Design Principles
//!
//! - **Payloads are encrypted per device**: push services only see ciphertext
//! - **Best-effort delivery**: one attempt per device, counts returned to the caller
//! - **Self-cleaning**: subscriptions reported gone (404/410) are pruned
//! - **Minimal logging**: no key material, no full endpoint URLs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │     App     │────▶│   Backend   │────▶│ Push service │────▶ device
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                            │
//!                     Subscription store
//! ```
//!
//! ## API Overview
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/health` | GET | Health check |
//! | `/v1/push/public-key` | GET | VAPID public key |
//! | `/v1/subscriptions` | POST | Register a browser subscription |
//! | `/v1/subscriptions` | DELETE | Remove a subscription |
//! | `/v1/notify` | POST | Notify the other member(s) of a group |

pub mod auth;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod handlers;
pub mod models;
pub mod store;

pub use config::Config;
pub use delivery::{Deliverer, DeliveryOptions};
pub use handlers::AppState;
pub use store::{MemoryStore, SubscriptionStore};

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Maximum request body size (16 KiB).
pub const MAX_BODY_SIZE: usize = 16 * 1024;

/// Build the Axum router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Unauthenticated
        .route("/health", get(handlers::health))
        .route("/v1/push/public-key", get(handlers::public_key))
        // API v1 endpoints
        .route(
            "/v1/subscriptions",
            post(handlers::subscribe).delete(handlers::unsubscribe),
        )
        .route("/v1/notify", post(handlers::notify))
        // Middleware stack (order matters: first added = outermost)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiToken;
    use crate::models::PayloadDefaults;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use duet_core::VapidIdentity;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let store: Arc<dyn SubscriptionStore> = Arc::new(MemoryStore::new());
        let identity = Arc::new(
            VapidIdentity::generate(&mut StdRng::seed_from_u64(1), "mailto:t@example.com")
                .unwrap(),
        );
        let deliverer = Arc::new(
            Deliverer::new(store.clone(), identity.clone(), DeliveryOptions::default()).unwrap(),
        );
        AppState::new(
            store,
            deliverer,
            identity,
            ApiToken::new(None),
            PayloadDefaults::default(),
        )
    }

    #[tokio::test]
    async fn health_route_is_mounted() {
        let response = build_router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let body = vec![b'x'; MAX_BODY_SIZE + 1];
        let response = build_router(state())
            .oneshot(
                Request::post("/v1/notify")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
