//! ReconcileUnprocessedEvents - re-dispatches events that were recorded but
//! never finished processing.
//!
//! Stripe stops redelivering after a few days. Anything still unprocessed
//! after `min_age` is picked up here from its stored payload. Each event is
//! claimed first, so a sweep never runs alongside a live delivery of the
//! same event.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::order::OrderStateUpdater;
use crate::domain::webhook::{
    EventDispatcher, InboundEvent, StripeEvent, WebhookError, PROCESSING_LEASE,
};
use crate::ports::{InboundEventStore, OrderRepository};

/// Command to run one reconciliation sweep.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileEventsCommand {
    /// Only events created before this instant are considered.
    pub older_than: Timestamp,
    /// Maximum events handled per sweep.
    pub limit: u32,
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileEventsResult {
    pub examined: usize,
    pub processed: usize,
    pub failed: usize,
    /// Events claimed by a concurrent delivery when the sweep reached them.
    pub skipped: usize,
}

pub struct ReconcileUnprocessedEvents {
    store: Arc<dyn InboundEventStore>,
    dispatcher: EventDispatcher,
    lease: Duration,
}

impl ReconcileUnprocessedEvents {
    pub fn new(store: Arc<dyn InboundEventStore>, orders: Arc<dyn OrderRepository>) -> Self {
        Self {
            store,
            dispatcher: EventDispatcher::new(OrderStateUpdater::new(orders)),
            lease: PROCESSING_LEASE,
        }
    }

    /// Runs one sweep.
    ///
    /// Per-event failures are logged and counted; the event stays unprocessed.
    /// Only a failure to list events aborts the sweep.
    pub async fn handle(
        &self,
        cmd: ReconcileEventsCommand,
    ) -> Result<ReconcileEventsResult, DomainError> {
        let stranded = self.store.find_unprocessed(cmd.older_than, cmd.limit).await?;
        let mut result = ReconcileEventsResult {
            examined: stranded.len(),
            ..Default::default()
        };

        for event in stranded {
            let stale_before = Timestamp::now().minus_secs(self.lease.as_secs());
            if !self.store.try_claim(&event.event_id, stale_before).await? {
                tracing::debug!(event_id = %event.event_id, "Event claimed elsewhere, skipping");
                result.skipped += 1;
                continue;
            }

            match self.reprocess(&event).await {
                Ok(()) => result.processed += 1,
                Err(e) => {
                    tracing::warn!(
                        event_id = %event.event_id,
                        event_type = %event.event_type,
                        error = %e,
                        "Reconciliation failed, will retry on next sweep"
                    );
                    if let Err(e) = self.store.release_claim(&event.event_id).await {
                        tracing::warn!(event_id = %event.event_id, error = %e, "Failed to release event claim");
                    }
                    result.failed += 1;
                }
            }
        }

        if result.examined > 0 {
            tracing::info!(
                examined = result.examined,
                processed = result.processed,
                failed = result.failed,
                skipped = result.skipped,
                "Reconciliation sweep finished"
            );
        }
        Ok(result)
    }

    async fn reprocess(&self, event: &InboundEvent) -> Result<(), WebhookError> {
        let stripe_event: StripeEvent = serde_json::from_value(event.payload.clone())
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let outcome = self.dispatcher.dispatch(&stripe_event).await?;
        self.store.mark_processed(&event.event_id).await?;

        // Settlements apply to orders pending now, which may postdate the event.
        tracing::info!(
            event_id = %event.event_id,
            event_created = ?stripe_event.created,
            received_at = ?event.created_at,
            ?outcome,
            "Reconciled stranded event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryInboundEventStore, InMemoryOrderRepository};
    use crate::domain::order::{Order, OrderStatus};
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemoryInboundEventStore>,
        orders: Arc<InMemoryOrderRepository>,
        handler: ReconcileUnprocessedEvents,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryInboundEventStore::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let handler = ReconcileUnprocessedEvents::new(store.clone(), orders.clone());
        Fixture {
            store,
            orders,
            handler,
        }
    }

    async fn stranded(store: &InMemoryInboundEventStore, payload: serde_json::Value, age: u64) {
        let event_id = payload["id"].as_str().unwrap().to_string();
        let event_type = payload["type"].as_str().unwrap().to_string();
        let mut event = InboundEvent::received(event_id, event_type, payload);
        event.created_at = Timestamp::now().minus_secs(age);
        store.insert_if_absent(&event).await.unwrap();
    }

    fn sweep() -> ReconcileEventsCommand {
        ReconcileEventsCommand {
            older_than: Timestamp::now().minus_secs(300),
            limit: 50,
        }
    }

    #[tokio::test]
    async fn stranded_payment_is_applied_and_marked() {
        let f = fixture();
        f.orders.save(&Order::new_pending("cus_1", 1000).unwrap()).await.unwrap();
        stranded(
            &f.store,
            json!({
                "id": "evt_1",
                "type": "invoice.payment_succeeded",
                "data": {"object": {"id": "in_1", "customer": "cus_1", "amount_paid": 1000}}
            }),
            900,
        )
        .await;

        let result = f.handler.handle(sweep()).await.unwrap();

        assert_eq!(
            result,
            ReconcileEventsResult {
                examined: 1,
                processed: 1,
                failed: 0,
                skipped: 0,
            }
        );
        assert!(f.store.find_by_event_id("evt_1").await.unwrap().unwrap().processed);
        assert_eq!(
            f.orders.find_by_customer("cus_1").await.unwrap()[0].status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn recent_events_are_left_for_redelivery() {
        let f = fixture();
        stranded(&f.store, json!({"id": "evt_new", "type": "charge.refunded"}), 10).await;

        let result = f.handler.handle(sweep()).await.unwrap();

        assert_eq!(result.examined, 0);
        assert!(!f.store.find_by_event_id("evt_new").await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn failing_event_is_counted_and_left_unprocessed() {
        let f = fixture();
        stranded(
            &f.store,
            json!({"id": "evt_bad", "type": "invoice.payment_failed", "data": {"object": {}}}),
            900,
        )
        .await;
        stranded(&f.store, json!({"id": "evt_ok", "type": "charge.refunded"}), 900).await;

        let result = f.handler.handle(sweep()).await.unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(result.failed, 1);
        assert!(!f.store.find_by_event_id("evt_bad").await.unwrap().unwrap().processed);
        assert!(f.store.find_by_event_id("evt_ok").await.unwrap().unwrap().processed);
        assert!(f
            .store
            .find_by_event_id("evt_bad")
            .await
            .unwrap()
            .unwrap()
            .claimed_at
            .is_none());
    }

    #[tokio::test]
    async fn event_claimed_by_a_live_delivery_is_skipped() {
        let f = fixture();
        f.orders.save(&Order::new_pending("cus_1", 1000).unwrap()).await.unwrap();
        stranded(
            &f.store,
            json!({
                "id": "evt_busy",
                "type": "invoice.payment_succeeded",
                "data": {"object": {"id": "in_1", "customer": "cus_1"}}
            }),
            900,
        )
        .await;
        // A redelivery has just taken over the stale claim.
        assert!(f
            .store
            .try_claim("evt_busy", Timestamp::now().minus_secs(60))
            .await
            .unwrap());

        let result = f.handler.handle(sweep()).await.unwrap();

        assert_eq!(result.examined, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.processed, 0);
        assert_eq!(
            f.orders.find_by_customer("cus_1").await.unwrap()[0].status,
            OrderStatus::Pending
        );
    }
}
