//! HTTP adapter for Stripe webhook endpoints.
//!
//! - `POST /api/stripe/webhook` - Handle Stripe webhooks
//! - `GET /api/health` - Liveness check

pub mod dto;
mod handlers;
mod routes;

pub use handlers::{
    handle_stripe_webhook, health, WebhookApiError, WebhookAppState, STRIPE_SIGNATURE_HEADER,
};
pub use routes::{app, webhook_router};
