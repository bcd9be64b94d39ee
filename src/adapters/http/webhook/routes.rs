//! Axum router configuration for webhook endpoints.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::handlers::{handle_stripe_webhook, health, WebhookAppState};

/// Create the webhook API router.
///
/// # Routes
/// - `POST /api/stripe/webhook` - Stripe webhooks (no auth, signature verified)
/// - `GET /api/health` - Liveness check
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new()
        .route("/api/stripe/webhook", post(handle_stripe_webhook))
        .route("/api/health", get(health))
}

/// Complete application: routes, state, request ids, tracing and timeout.
pub fn app(state: WebhookAppState, request_timeout: Duration) -> Router {
    webhook_router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(request_timeout)),
    )
}
