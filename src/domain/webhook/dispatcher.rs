//! Event dispatcher - routes an admitted Stripe event by its `type`.
//!
//! `data.object` is decoded only inside the branch that needs it. A decode
//! failure there is a handler failure, which leaves the event unprocessed.

use serde::de::DeserializeOwned;

use crate::domain::order::OrderStateUpdater;

use super::stripe_event::{InvoiceObject, StripeEvent, StripeEventType, SubscriptionObject};
use super::webhook_errors::WebhookError;

/// What dispatch did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// `invoice.payment_succeeded` settled `count` pending orders.
    OrdersPaid { count: u64 },
    /// `invoice.payment_failed` settled `count` pending orders.
    OrdersFailed { count: u64 },
    /// Subscription lifecycle event, logged only.
    Recorded(StripeEventType),
    /// Event type without a handler. Acknowledged, never an error.
    Unhandled(String),
}

pub struct EventDispatcher {
    orders: OrderStateUpdater,
}

impl EventDispatcher {
    pub fn new(orders: OrderStateUpdater) -> Self {
        Self { orders }
    }

    pub async fn dispatch(&self, event: &StripeEvent) -> Result<DispatchOutcome, WebhookError> {
        let event_type = event.parsed_type();
        match event_type {
            StripeEventType::InvoicePaymentSucceeded => {
                let invoice: InvoiceObject = decode(event)?;
                let count = self.orders.mark_paid(&invoice).await?;
                Ok(DispatchOutcome::OrdersPaid { count })
            }
            StripeEventType::InvoicePaymentFailed => {
                let invoice: InvoiceObject = decode(event)?;
                let count = self.orders.mark_failed(&invoice).await?;
                Ok(DispatchOutcome::OrdersFailed { count })
            }
            StripeEventType::CustomerSubscriptionCreated
            | StripeEventType::CustomerSubscriptionUpdated
            | StripeEventType::CustomerSubscriptionDeleted => {
                let subscription: SubscriptionObject = decode(event)?;
                tracing::info!(
                    event_type = event_type.as_str(),
                    subscription_id = %subscription.id,
                    customer_id = subscription.customer.as_deref().unwrap_or("-"),
                    status = subscription.status.as_deref().unwrap_or("-"),
                    "Subscription event recorded"
                );
                Ok(DispatchOutcome::Recorded(event_type))
            }
            StripeEventType::Unknown => {
                tracing::info!(event_type = %event.event_type, "Unhandled Stripe event type");
                Ok(DispatchOutcome::Unhandled(event.event_type.clone()))
            }
        }
    }
}

fn decode<T: DeserializeOwned>(event: &StripeEvent) -> Result<T, WebhookError> {
    event
        .decode_object()
        .map_err(|e| WebhookError::InvalidObject {
            event_type: event.event_type.clone(),
            reason: e.to_string(),
        })
}
