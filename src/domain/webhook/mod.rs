//! Stripe webhook domain.
//!
//! - `webhook_verifier` - Signature verification
//! - `stripe_event` - Event envelope and typed `data.object` shapes
//! - `inbound_event` - Persisted record of a delivery
//! - `idempotency_gate` - Dedup by event id before dispatch
//! - `dispatcher` - Routing by event type

mod dispatcher;
mod idempotency_gate;
mod inbound_event;
mod stripe_event;
mod webhook_errors;
mod webhook_verifier;

pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use idempotency_gate::{Admission, IdempotencyGate, RedeliveryPolicy, PROCESSING_LEASE};
pub use inbound_event::InboundEvent;
pub use stripe_event::{
    InvoiceObject, StripeEvent, StripeEventData, StripeEventType, SubscriptionObject,
};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{
    SignatureHeader, StripeWebhookVerifier, VerifiedEvent, DEFAULT_TOLERANCE_SECS,
};

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
