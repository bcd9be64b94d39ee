//! Webhook handlers.
//!
//! ## Commands
//! - Processing a Stripe webhook delivery
//! - Reconciling events that were recorded but never processed

mod process_webhook;
mod reconcile_events;

pub use process_webhook::{ProcessWebhookCommand, ProcessWebhookHandler, ProcessWebhookResult};
pub use reconcile_events::{
    ReconcileEventsCommand, ReconcileEventsResult, ReconcileUnprocessedEvents,
};
