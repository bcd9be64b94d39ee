//! Idempotency gate - decides whether a verified event may be dispatched.
//!
//! ## Race Condition Handling
//!
//! When multiple deliveries of one event arrive simultaneously:
//! - First to insert wins (unique constraint on `event_id`) and holds the
//!   processing claim
//! - Others see an existing row. Under `Reprocess` they are re-admitted only
//!   if they can take over a stale or released claim; otherwise they are
//!   turned away as in progress

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::foundation::Timestamp;
use crate::ports::{InboundEventStore, InsertOutcome};

use super::inbound_event::InboundEvent;
use super::webhook_errors::WebhookError;
use super::webhook_verifier::VerifiedEvent;

/// What to do with a redelivered event whose row is still unprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedeliveryPolicy {
    /// Dispatch again. Safe because payment updates only touch pending orders.
    #[default]
    Reprocess,
    /// Treat as a duplicate and acknowledge.
    Skip,
}

impl FromStr for RedeliveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reprocess" => Ok(RedeliveryPolicy::Reprocess),
            "skip" => Ok(RedeliveryPolicy::Skip),
            other => Err(format!("unknown redelivery policy: {}", other)),
        }
    }
}

/// How long a processing claim blocks other deliveries of the same event.
///
/// A holder that crashes without releasing its claim is retried after this.
pub const PROCESSING_LEASE: Duration = Duration::from_secs(60);

/// Gate decision for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First delivery; the row was just created.
    Fresh { event_id: String },
    /// Earlier delivery was recorded but never finished processing.
    /// This caller now holds the claim.
    Retry { event_id: String },
    /// Another caller holds a live claim on this event.
    InProgress { event_id: String },
    /// Nothing to do. `event_id` is `None` when the event had no id.
    Duplicate { event_id: Option<String> },
}

pub struct IdempotencyGate {
    store: Arc<dyn InboundEventStore>,
    policy: RedeliveryPolicy,
    lease: Duration,
}

impl IdempotencyGate {
    pub fn new(store: Arc<dyn InboundEventStore>, policy: RedeliveryPolicy) -> Self {
        Self {
            store,
            policy,
            lease: PROCESSING_LEASE,
        }
    }

    pub fn with_processing_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Consults the event store and records the event if it is new.
    ///
    /// An event without an id is never recorded and never dispatched.
    pub async fn admit(&self, verified: &VerifiedEvent) -> Result<Admission, WebhookError> {
        let Some(record) = InboundEvent::from_verified(verified) else {
            tracing::warn!(
                event_type = %verified.event.event_type,
                "Stripe event has no id, treating as duplicate"
            );
            return Ok(Admission::Duplicate { event_id: None });
        };

        let event_id = record.event_id.clone();
        let admission = match self.store.insert_if_absent(&record).await? {
            InsertOutcome::Inserted => Admission::Fresh { event_id },
            InsertOutcome::AlreadyProcessed => Admission::Duplicate {
                event_id: Some(event_id),
            },
            InsertOutcome::Unprocessed => match self.policy {
                RedeliveryPolicy::Reprocess => {
                    let stale_before = Timestamp::now().minus_secs(self.lease.as_secs());
                    if self.store.try_claim(&event_id, stale_before).await? {
                        Admission::Retry { event_id }
                    } else {
                        Admission::InProgress { event_id }
                    }
                }
                RedeliveryPolicy::Skip => Admission::Duplicate {
                    event_id: Some(event_id),
                },
            },
        };

        tracing::debug!(?admission, "Idempotency gate decision");
        Ok(admission)
    }

    /// Hands the claim back after a failed attempt so the next delivery can
    /// retry at once. Failure to release only delays that until the lease
    /// runs out, so it is logged and swallowed.
    pub async fn release(&self, event_id: &str) {
        if let Err(e) = self.store.release_claim(event_id).await {
            tracing::warn!(event_id = %event_id, error = %e, "Failed to release event claim");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryInboundEventStore;
    use crate::domain::webhook::StripeEventBuilder;
    use serde_json::json;

    fn verified(id: Option<&str>) -> VerifiedEvent {
        let builder = StripeEventBuilder::new().event_type("invoice.payment_succeeded");
        let event = match id {
            Some(id) => builder.id(id).build(),
            None => builder.without_id().build(),
        };
        VerifiedEvent {
            payload: json!({"id": event.id, "type": event.event_type}),
            event,
        }
    }

    fn gate(policy: RedeliveryPolicy) -> (Arc<InMemoryInboundEventStore>, IdempotencyGate) {
        let store = Arc::new(InMemoryInboundEventStore::new());
        let gate = IdempotencyGate::new(store.clone(), policy);
        (store, gate)
    }

    #[tokio::test]
    async fn new_event_is_fresh_and_recorded_unprocessed() {
        let (store, gate) = gate(RedeliveryPolicy::Reprocess);

        let admission = gate.admit(&verified(Some("evt_1"))).await.unwrap();

        assert_eq!(admission, Admission::Fresh { event_id: "evt_1".to_string() });
        let row = store.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert!(!row.processed);
        assert_eq!(row.event_type, "invoice.payment_succeeded");
    }

    #[tokio::test]
    async fn missing_id_is_duplicate_without_row() {
        let (store, gate) = gate(RedeliveryPolicy::Reprocess);

        let admission = gate.admit(&verified(None)).await.unwrap();

        assert_eq!(admission, Admission::Duplicate { event_id: None });
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn processed_event_is_duplicate() {
        let (store, gate) = gate(RedeliveryPolicy::Reprocess);
        gate.admit(&verified(Some("evt_1"))).await.unwrap();
        store.mark_processed("evt_1").await.unwrap();

        let admission = gate.admit(&verified(Some("evt_1"))).await.unwrap();

        assert_eq!(
            admission,
            Admission::Duplicate { event_id: Some("evt_1".to_string()) }
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unprocessed_event_in_flight_is_not_admitted_twice() {
        let (store, gate) = gate(RedeliveryPolicy::default());
        gate.admit(&verified(Some("evt_1"))).await.unwrap();

        let admission = gate.admit(&verified(Some("evt_1"))).await.unwrap();

        assert_eq!(admission, Admission::InProgress { event_id: "evt_1".to_string() });
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn released_event_is_retried_by_default() {
        let (store, gate) = gate(RedeliveryPolicy::default());
        gate.admit(&verified(Some("evt_1"))).await.unwrap();
        gate.release("evt_1").await;

        let admission = gate.admit(&verified(Some("evt_1"))).await.unwrap();

        assert_eq!(admission, Admission::Retry { event_id: "evt_1".to_string() });
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn abandoned_claim_is_retried_once_the_lease_runs_out() {
        let (_, gate) = gate(RedeliveryPolicy::default());
        let gate = gate.with_processing_lease(Duration::ZERO);
        gate.admit(&verified(Some("evt_1"))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let admission = gate.admit(&verified(Some("evt_1"))).await.unwrap();

        assert_eq!(admission, Admission::Retry { event_id: "evt_1".to_string() });
    }

    #[tokio::test]
    async fn concurrent_redeliveries_of_released_event_admit_exactly_one() {
        let (store, gate) = gate(RedeliveryPolicy::Reprocess);
        gate.admit(&verified(Some("evt_race"))).await.unwrap();
        gate.release("evt_race").await;
        let gate = Arc::new(gate);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.admit(&verified(Some("evt_race"))).await.unwrap()
            }));
        }

        let mut retries = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Admission::Retry { .. } => retries += 1,
                Admission::InProgress { .. } => {}
                other => panic!("unexpected admission {:?}", other),
            }
        }
        assert_eq!(retries, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unprocessed_event_is_skipped_under_skip_policy() {
        let (_, gate) = gate(RedeliveryPolicy::Skip);
        gate.admit(&verified(Some("evt_1"))).await.unwrap();

        let admission = gate.admit(&verified(Some("evt_1"))).await.unwrap();

        assert!(matches!(admission, Admission::Duplicate { .. }));
    }

    #[tokio::test]
    async fn concurrent_deliveries_admit_exactly_one_under_either_policy() {
        for policy in [RedeliveryPolicy::Skip, RedeliveryPolicy::Reprocess] {
            let (store, gate) = gate(policy);
            let gate = Arc::new(gate);

            let mut handles = Vec::new();
            for _ in 0..8 {
                let gate = gate.clone();
                handles.push(tokio::spawn(async move {
                    gate.admit(&verified(Some("evt_race"))).await.unwrap()
                }));
            }

            let mut admitted = 0;
            for handle in handles {
                if matches!(
                    handle.await.unwrap(),
                    Admission::Fresh { .. } | Admission::Retry { .. }
                ) {
                    admitted += 1;
                }
            }
            assert_eq!(admitted, 1, "policy {:?}", policy);
            assert_eq!(store.len().await, 1);
        }
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Skip".parse::<RedeliveryPolicy>().unwrap(), RedeliveryPolicy::Skip);
        assert_eq!(
            "reprocess".parse::<RedeliveryPolicy>().unwrap(),
            RedeliveryPolicy::Reprocess
        );
        assert!("later".parse::<RedeliveryPolicy>().is_err());
    }
}
