//! Order entity and the payment settlements applied to it.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrderId, StateMachine, Timestamp, ValidationError};

use super::status::OrderStatus;

/// An order awaiting, or resolved by, a Stripe invoice payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub stripe_customer_id: String,
    pub status: OrderStatus,
    pub amount_cents: i64,
    pub stripe_invoice_id: Option<String>,
    pub paid_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Creates a new pending order for a Stripe customer.
    pub fn new_pending(
        stripe_customer_id: impl Into<String>,
        amount_cents: i64,
    ) -> Result<Self, ValidationError> {
        let stripe_customer_id = stripe_customer_id.into();
        if stripe_customer_id.trim().is_empty() {
            return Err(ValidationError::empty_field("stripe_customer_id"));
        }

        let now = Timestamp::now();
        Ok(Self {
            id: OrderId::new(),
            stripe_customer_id,
            status: OrderStatus::Pending,
            amount_cents,
            stripe_invoice_id: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns true if a payment event for `customer_id` may settle this order.
    pub fn is_settleable_by(&self, customer_id: &str) -> bool {
        self.status == OrderStatus::Pending && self.stripe_customer_id == customer_id
    }

    /// Applies an invoice outcome to this order.
    ///
    /// Fails without touching the order unless it is still pending.
    pub fn settle(&mut self, settlement: &PaymentSettlement) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(settlement.target_status())?;
        self.stripe_invoice_id = Some(settlement.invoice_id().to_string());
        if let PaymentSettlement::Paid { paid_at, .. } = settlement {
            self.paid_at = Some(*paid_at);
        }
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Cancels a pending order.
    pub fn cancel(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(OrderStatus::Cancelled)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

/// Outcome of an invoice, applied in bulk to a customer's pending orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSettlement {
    /// `invoice.payment_succeeded`
    Paid { invoice_id: String, paid_at: Timestamp },

    /// `invoice.payment_failed`
    Failed { invoice_id: String },
}

impl PaymentSettlement {
    pub fn paid(invoice_id: impl Into<String>, paid_at: Timestamp) -> Self {
        PaymentSettlement::Paid {
            invoice_id: invoice_id.into(),
            paid_at,
        }
    }

    pub fn failed(invoice_id: impl Into<String>) -> Self {
        PaymentSettlement::Failed {
            invoice_id: invoice_id.into(),
        }
    }

    /// Status the settled orders move to.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            PaymentSettlement::Paid { .. } => OrderStatus::Paid,
            PaymentSettlement::Failed { .. } => OrderStatus::Failed,
        }
    }

    pub fn invoice_id(&self) -> &str {
        match self {
            PaymentSettlement::Paid { invoice_id, .. } => invoice_id,
            PaymentSettlement::Failed { invoice_id } => invoice_id,
        }
    }

    /// `paid_at` to stamp on settled orders, if any.
    pub fn paid_at(&self) -> Option<Timestamp> {
        match self {
            PaymentSettlement::Paid { paid_at, .. } => Some(*paid_at),
            PaymentSettlement::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_order() -> Order {
        Order::new_pending("cus_1", 1000).unwrap()
    }

    #[test]
    fn new_order_starts_pending_without_payment_data() {
        let order = pending_order();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.stripe_invoice_id.is_none());
        assert!(order.paid_at.is_none());
    }

    #[test]
    fn new_order_requires_customer() {
        assert!(matches!(
            Order::new_pending("  ", 100),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn paid_settlement_sets_invoice_and_paid_at() {
        let mut order = pending_order();
        let now = Timestamp::now();

        order.settle(&PaymentSettlement::paid("in_1", now)).unwrap();

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.stripe_invoice_id.as_deref(), Some("in_1"));
        assert_eq!(order.paid_at, Some(now));
    }

    #[test]
    fn failed_settlement_leaves_paid_at_unset() {
        let mut order = pending_order();

        order.settle(&PaymentSettlement::failed("in_2")).unwrap();

        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.stripe_invoice_id.as_deref(), Some("in_2"));
        assert!(order.paid_at.is_none());
    }

    #[test]
    fn settled_order_rejects_second_settlement_unchanged() {
        let mut order = pending_order();
        order
            .settle(&PaymentSettlement::paid("in_1", Timestamp::now()))
            .unwrap();
        let before = order.clone();

        let result = order.settle(&PaymentSettlement::failed("in_9"));

        assert!(result.is_err());
        assert_eq!(order, before);
    }

    #[test]
    fn settleable_only_when_pending_and_customer_matches() {
        let mut order = pending_order();
        assert!(order.is_settleable_by("cus_1"));
        assert!(!order.is_settleable_by("cus_2"));

        order.cancel().unwrap();
        assert!(!order.is_settleable_by("cus_1"));
    }

    #[test]
    fn settlement_accessors() {
        let now = Timestamp::now();
        let paid = PaymentSettlement::paid("in_a", now);
        let failed = PaymentSettlement::failed("in_b");

        assert_eq!(paid.target_status(), OrderStatus::Paid);
        assert_eq!(paid.paid_at(), Some(now));
        assert_eq!(failed.target_status(), OrderStatus::Failed);
        assert_eq!(failed.invoice_id(), "in_b");
        assert_eq!(failed.paid_at(), None);
    }
}
