//! ProcessWebhookHandler - Command handler for inbound Stripe webhooks.
//!
//! Verify, then gate, then dispatch, then mark processed. The event row is
//! written by the gate before dispatch, so a failure during dispatch leaves
//! it `processed = false` for redelivery or the reconciler. The claim taken
//! by the gate is released on failure so the next redelivery can proceed.

use std::sync::Arc;

use crate::domain::order::OrderStateUpdater;
use crate::domain::webhook::{
    Admission, DispatchOutcome, EventDispatcher, IdempotencyGate, RedeliveryPolicy, StripeEvent,
    StripeWebhookVerifier, WebhookError,
};
use crate::ports::{InboundEventStore, OrderRepository};

/// Command to process a Stripe webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header, if present.
    pub signature: Option<String>,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessWebhookResult {
    /// Event admitted, dispatched and marked processed.
    Processed {
        event_id: String,
        outcome: DispatchOutcome,
    },
    /// Duplicate delivery, delivery racing one still in flight, or event
    /// without id. Nothing was done.
    AlreadyProcessed { event_id: Option<String> },
}

pub struct ProcessWebhookHandler {
    verifier: Arc<StripeWebhookVerifier>,
    store: Arc<dyn InboundEventStore>,
    gate: IdempotencyGate,
    dispatcher: EventDispatcher,
}

impl ProcessWebhookHandler {
    pub fn new(
        verifier: Arc<StripeWebhookVerifier>,
        store: Arc<dyn InboundEventStore>,
        orders: Arc<dyn OrderRepository>,
        policy: RedeliveryPolicy,
    ) -> Self {
        Self {
            verifier,
            gate: IdempotencyGate::new(store.clone(), policy),
            dispatcher: EventDispatcher::new(OrderStateUpdater::new(orders)),
            store,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
    ) -> Result<ProcessWebhookResult, WebhookError> {
        // 1. Verify signature and parse event
        let verified = self
            .verifier
            .verify_and_parse(&cmd.payload, cmd.signature.as_deref())
            .map_err(|e| {
                tracing::warn!(error = %e, "Stripe webhook rejected");
                e
            })?;

        tracing::info!(
            event_id = verified.event.event_id().unwrap_or("-"),
            event_type = %verified.event.event_type,
            "Received Stripe event"
        );

        // 2. Idempotency check, recording the event if new
        let event_id = match self.gate.admit(&verified).await? {
            Admission::Duplicate { event_id } => {
                tracing::info!(
                    event_id = event_id.as_deref().unwrap_or("-"),
                    "Event already processed"
                );
                return Ok(ProcessWebhookResult::AlreadyProcessed { event_id });
            }
            Admission::InProgress { event_id } => {
                tracing::info!(event_id = %event_id, "Event is being processed by another delivery");
                return Ok(ProcessWebhookResult::AlreadyProcessed {
                    event_id: Some(event_id),
                });
            }
            Admission::Retry { event_id } => {
                tracing::info!(event_id = %event_id, "Reprocessing unfinished event");
                event_id
            }
            Admission::Fresh { event_id } => event_id,
        };

        // 3. Dispatch by type, 4. mark processed
        let outcome = match self.complete(&verified.event, &event_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    event_id = %event_id,
                    event_type = %verified.event.event_type,
                    error = %e,
                    "Error processing Stripe event"
                );
                self.gate.release(&event_id).await;
                return Err(e);
            }
        };

        tracing::info!(event_id = %event_id, ?outcome, "Event processed");
        Ok(ProcessWebhookResult::Processed { event_id, outcome })
    }

    async fn complete(
        &self,
        event: &StripeEvent,
        event_id: &str,
    ) -> Result<DispatchOutcome, WebhookError> {
        let outcome = self.dispatcher.dispatch(event).await?;
        self.store.mark_processed(event_id).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryInboundEventStore, InMemoryOrderRepository};
    use crate::domain::order::{Order, OrderStatus};
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    struct Fixture {
        store: Arc<InMemoryInboundEventStore>,
        orders: Arc<InMemoryOrderRepository>,
        verifier: Arc<StripeWebhookVerifier>,
        handler: ProcessWebhookHandler,
    }

    fn fixture(policy: RedeliveryPolicy) -> Fixture {
        let store = Arc::new(InMemoryInboundEventStore::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let verifier = Arc::new(StripeWebhookVerifier::new(SECRET));
        let handler =
            ProcessWebhookHandler::new(verifier.clone(), store.clone(), orders.clone(), policy);
        Fixture {
            store,
            orders,
            verifier,
            handler,
        }
    }

    impl Fixture {
        fn signed(&self, body: &serde_json::Value) -> ProcessWebhookCommand {
            let payload = body.to_string().into_bytes();
            let signature = self
                .verifier
                .signature_header(chrono::Utc::now().timestamp(), &payload)
                .unwrap();
            ProcessWebhookCommand {
                payload,
                signature: Some(signature),
            }
        }

        async fn pending_order(&self, customer: &str) -> Order {
            let order = Order::new_pending(customer, 1000).unwrap();
            self.orders.save(&order).await.unwrap();
            order
        }
    }

    fn payment_succeeded(event_id: &str, customer: &str) -> serde_json::Value {
        json!({
            "id": event_id,
            "type": "invoice.payment_succeeded",
            "data": {"object": {"id": "in_1", "customer": customer, "amount_paid": 1000}}
        })
    }

    #[tokio::test]
    async fn fresh_event_is_processed_and_marked() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        let order = f.pending_order("cus_1").await;

        let result = f
            .handler
            .handle(f.signed(&payment_succeeded("evt_1", "cus_1")))
            .await
            .unwrap();

        assert_eq!(
            result,
            ProcessWebhookResult::Processed {
                event_id: "evt_1".to_string(),
                outcome: DispatchOutcome::OrdersPaid { count: 1 },
            }
        );
        assert!(f.store.find_by_event_id("evt_1").await.unwrap().unwrap().processed);
        let order = f.orders.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn redelivery_is_already_processed() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        f.pending_order("cus_1").await;
        let body = payment_succeeded("evt_1", "cus_1");
        f.handler.handle(f.signed(&body)).await.unwrap();

        let result = f.handler.handle(f.signed(&body)).await.unwrap();

        assert_eq!(
            result,
            ProcessWebhookResult::AlreadyProcessed {
                event_id: Some("evt_1".to_string())
            }
        );
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn invalid_signature_records_nothing() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        let cmd = ProcessWebhookCommand {
            payload: payment_succeeded("evt_1", "cus_1").to_string().into_bytes(),
            signature: Some(format!("t={},v1={}", chrono::Utc::now().timestamp(), "0".repeat(64))),
        };

        let result = f.handler.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn missing_signature_records_nothing() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        let cmd = ProcessWebhookCommand {
            payload: b"{}".to_vec(),
            signature: None,
        };

        let result = f.handler.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::MissingSignature)));
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn event_without_id_is_already_processed() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        f.pending_order("cus_1").await;
        let body = json!({
            "type": "invoice.payment_succeeded",
            "data": {"object": {"id": "in_1", "customer": "cus_1"}}
        });

        let result = f.handler.handle(f.signed(&body)).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::AlreadyProcessed { event_id: None });
        assert!(f.store.is_empty().await);
        assert_eq!(
            f.orders.find_by_customer("cus_1").await.unwrap()[0].status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn handler_failure_leaves_event_unprocessed_then_retry_succeeds() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        f.pending_order("cus_1").await;
        f.orders.fail_next_settlements(1);
        let body = payment_succeeded("evt_1", "cus_1");

        let first = f.handler.handle(f.signed(&body)).await;
        assert!(matches!(first, Err(WebhookError::Database(_))));
        assert!(!f.store.find_by_event_id("evt_1").await.unwrap().unwrap().processed);

        let second = f.handler.handle(f.signed(&body)).await.unwrap();

        assert!(matches!(second, ProcessWebhookResult::Processed { .. }));
        assert!(f.store.find_by_event_id("evt_1").await.unwrap().unwrap().processed);
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn delivery_racing_an_in_flight_one_is_acknowledged_without_dispatch() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        f.pending_order("cus_1").await;
        let body = payment_succeeded("evt_1", "cus_1");
        // Another delivery has recorded the event and still holds the claim.
        let first = f.signed(&body);
        let verified = f
            .verifier
            .verify_and_parse(&first.payload, first.signature.as_deref())
            .unwrap();
        let record = crate::domain::webhook::InboundEvent::from_verified(&verified).unwrap();
        f.store.insert_if_absent(&record).await.unwrap();

        let result = f.handler.handle(f.signed(&body)).await.unwrap();

        assert_eq!(
            result,
            ProcessWebhookResult::AlreadyProcessed {
                event_id: Some("evt_1".to_string())
            }
        );
        assert_eq!(
            f.orders.find_by_customer("cus_1").await.unwrap()[0].status,
            OrderStatus::Pending
        );
        assert!(!f.store.find_by_event_id("evt_1").await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn failed_attempt_releases_its_claim() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        f.pending_order("cus_1").await;
        f.orders.fail_next_settlements(1);

        assert!(f
            .handler
            .handle(f.signed(&payment_succeeded("evt_1", "cus_1")))
            .await
            .is_err());

        let row = f.store.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert!(!row.processed);
        assert!(row.claimed_at.is_none());
    }

    #[tokio::test]
    async fn skip_policy_acknowledges_unfinished_event() {
        let f = fixture(RedeliveryPolicy::Skip);
        f.pending_order("cus_1").await;
        f.orders.fail_next_settlements(1);
        let body = payment_succeeded("evt_1", "cus_1");
        assert!(f.handler.handle(f.signed(&body)).await.is_err());

        let result = f.handler.handle(f.signed(&body)).await.unwrap();

        assert!(matches!(result, ProcessWebhookResult::AlreadyProcessed { .. }));
        assert_eq!(
            f.orders.find_by_customer("cus_1").await.unwrap()[0].status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn unknown_event_type_is_processed() {
        let f = fixture(RedeliveryPolicy::Reprocess);
        let body = json!({"id": "evt_x", "type": "charge.refunded", "data": {"object": {}}});

        let result = f.handler.handle(f.signed(&body)).await.unwrap();

        assert_eq!(
            result,
            ProcessWebhookResult::Processed {
                event_id: "evt_x".to_string(),
                outcome: DispatchOutcome::Unhandled("charge.refunded".to_string()),
            }
        );
    }
}
