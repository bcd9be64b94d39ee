//! Order repository port.
//!
//! Payment events never load orders one by one. They settle every pending
//! order of a customer with a single predicate-scoped update, so a redelivered
//! event finds nothing left to change.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::{Order, PaymentSettlement};

/// Repository port for Order persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or replace an order.
    async fn save(&self, order: &Order) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError>;

    /// All orders of a Stripe customer, oldest first.
    async fn find_by_customer(&self, stripe_customer_id: &str) -> Result<Vec<Order>, DomainError>;

    /// Applies `settlement` to every order with this customer id that is
    /// still `pending`.
    ///
    /// Returns the number of orders changed. Zero is not an error.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn settle_pending(
        &self,
        stripe_customer_id: &str,
        settlement: &PaymentSettlement,
    ) -> Result<u64, DomainError>;
}
