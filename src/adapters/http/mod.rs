//! HTTP adapters - REST API implementations.

pub mod webhook;

pub use webhook::{app, webhook_router, WebhookAppState};
