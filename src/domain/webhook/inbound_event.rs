//! InboundEvent - durable record of a Stripe delivery.
//!
//! Created the moment an event passes the idempotency gate and before any
//! side effect runs. `processed` flips to true once, after dispatch succeeds.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::webhook_verifier::VerifiedEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Stripe event ID (evt_xxx format). Unique across the store.
    pub event_id: String,

    /// Stripe event type (e.g., "invoice.payment_succeeded").
    pub event_type: String,

    /// Full event body as received.
    pub payload: serde_json::Value,

    pub processed: bool,

    /// When the current processing attempt started. Set by the store.
    pub claimed_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl InboundEvent {
    /// Records a freshly received, not yet processed event.
    pub fn received(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload,
            processed: false,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the record for a verified event.
    ///
    /// Returns `None` when the event carries no usable id.
    pub fn from_verified(verified: &VerifiedEvent) -> Option<Self> {
        let event_id = verified.event.event_id()?;
        Some(Self::received(
            event_id,
            verified.event.event_type.clone(),
            verified.payload.clone(),
        ))
    }

    /// Marks the event processed. Returns false if it already was.
    pub fn mark_processed(&mut self) -> bool {
        if self.processed {
            return false;
        }
        self.processed = true;
        self.updated_at = Timestamp::now();
        true
    }
}
