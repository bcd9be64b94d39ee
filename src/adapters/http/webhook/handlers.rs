//! HTTP handlers for the Stripe webhook endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{ProcessWebhookCommand, ProcessWebhookHandler, ProcessWebhookResult};
use crate::domain::foundation::Timestamp;
use crate::domain::webhook::{RedeliveryPolicy, StripeWebhookVerifier, WebhookError};
use crate::ports::{InboundEventStore, OrderRepository};

use super::dto::{HealthResponse, MessageResponse, StatusResponse};

/// Header carrying Stripe's signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state, cloned per request.
#[derive(Clone)]
pub struct WebhookAppState {
    pub verifier: Arc<StripeWebhookVerifier>,
    pub event_store: Arc<dyn InboundEventStore>,
    pub order_repository: Arc<dyn OrderRepository>,
    pub redelivery_policy: RedeliveryPolicy,
}

impl WebhookAppState {
    pub fn process_webhook_handler(&self) -> ProcessWebhookHandler {
        ProcessWebhookHandler::new(
            self.verifier.clone(),
            self.event_store.clone(),
            self.order_repository.clone(),
            self.redelivery_policy,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/stripe/webhook - Handle Stripe webhook events
pub async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let response = match state.process_webhook_handler().handle(cmd).await? {
        ProcessWebhookResult::AlreadyProcessed { .. } => {
            (StatusCode::OK, Json(MessageResponse::already_processed())).into_response()
        }
        ProcessWebhookResult::Processed { .. } => {
            (StatusCode::OK, Json(StatusResponse::success())).into_response()
        }
    };
    Ok(response)
}

/// GET /api/health - Liveness check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Order webhooks service is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Timestamp::now().as_datetime().to_rfc3339(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Maps webhook failures to the two bodies Stripe sees.
///
/// The specific reason is logged by the application handler and never echoed.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if self.0.is_verification_failure() {
            (status, Json(MessageResponse::invalid_signature())).into_response()
        } else {
            (status, Json(StatusResponse::processing_failed())).into_response()
        }
    }
}
