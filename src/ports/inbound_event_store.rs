//! InboundEventStore port - Durable record of every Stripe delivery.
//!
//! The store is the only coordination point between concurrent deliveries of
//! the same event and the reconciliation sweep.
//!
//! ## Processing Claims
//!
//! A row that is not yet processed carries a claim timestamp. Whoever holds a
//! live claim is the only caller allowed to dispatch the event:
//! - The delivery that inserts the row holds the claim from `created_at`
//! - A later caller takes it over with `try_claim` once it has gone stale
//! - A caller whose dispatch fails hands it back with `release_claim`

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::webhook::InboundEvent;

/// Result of attempting to record an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row created (first time seeing this event). The caller holds the claim.
    Inserted,
    /// A row exists and has been processed.
    AlreadyProcessed,
    /// A row exists but processing never completed.
    Unprocessed,
}

/// Port for recording Stripe events and tracking their processing.
///
/// Implementations must back `insert_if_absent` with a unique constraint on
/// `event_id` and make `try_claim` a single conditional update, so that two
/// concurrent callers can never both be told they may dispatch.
#[async_trait]
pub trait InboundEventStore: Send + Sync {
    /// Atomically creates the row unless one with the same `event_id` exists.
    ///
    /// Uses `ON CONFLICT DO NOTHING` semantics; an existing row is left
    /// untouched and its processed flag reported. A new row is claimed by the
    /// caller as of its `created_at`.
    async fn insert_if_absent(&self, event: &InboundEvent) -> Result<InsertOutcome, DomainError>;

    /// Find an event by its Stripe event ID.
    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<InboundEvent>, DomainError>;

    /// Takes the processing claim on an unprocessed row.
    ///
    /// Succeeds only if the row has no claim or its claim is older than
    /// `stale_before`. Returns false otherwise, including for processed or
    /// unknown rows.
    async fn try_claim(
        &self,
        event_id: &str,
        stale_before: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Drops the claim on an unprocessed row so the next delivery may retry.
    async fn release_claim(&self, event_id: &str) -> Result<(), DomainError>;

    /// Sets `processed = true`.
    ///
    /// Returns false if no unprocessed row with this id exists.
    async fn mark_processed(&self, event_id: &str) -> Result<bool, DomainError>;

    /// Lists unprocessed events created before `older_than`, oldest first.
    async fn find_unprocessed(
        &self,
        older_than: Timestamp,
        limit: u32,
    ) -> Result<Vec<InboundEvent>, DomainError>;
}
