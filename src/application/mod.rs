//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
pub mod reconciler;

pub use handlers::{
    ProcessWebhookCommand, ProcessWebhookHandler, ProcessWebhookResult, ReconcileEventsCommand,
    ReconcileEventsResult, ReconcileUnprocessedEvents,
};
pub use reconciler::{Reconciler, ReconcilerConfig};
