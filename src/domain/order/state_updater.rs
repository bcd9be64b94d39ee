//! OrderStateUpdater - applies invoice outcomes to a customer's pending orders.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::webhook::InvoiceObject;
use crate::ports::OrderRepository;

use super::aggregate::PaymentSettlement;

pub struct OrderStateUpdater {
    repository: Arc<dyn OrderRepository>,
}

impl OrderStateUpdater {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self { repository }
    }

    /// Marks every pending order of the invoice's customer as paid.
    ///
    /// Returns the number of orders updated.
    pub async fn mark_paid(&self, invoice: &InvoiceObject) -> Result<u64, DomainError> {
        let settlement = PaymentSettlement::paid(invoice.id.clone(), Timestamp::now());
        let count = self
            .repository
            .settle_pending(&invoice.customer, &settlement)
            .await?;

        tracing::info!(
            customer_id = %invoice.customer,
            invoice_id = %invoice.id,
            amount_paid = invoice.amount_paid,
            orders_updated = count,
            "Orders marked as paid"
        );
        Ok(count)
    }

    /// Marks every pending order of the invoice's customer as failed.
    pub async fn mark_failed(&self, invoice: &InvoiceObject) -> Result<u64, DomainError> {
        let settlement = PaymentSettlement::failed(invoice.id.clone());
        let count = self
            .repository
            .settle_pending(&invoice.customer, &settlement)
            .await?;

        tracing::warn!(
            customer_id = %invoice.customer,
            invoice_id = %invoice.id,
            orders_updated = count,
            "Orders marked as failed"
        );
        Ok(count)
    }
}
