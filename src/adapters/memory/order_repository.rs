//! In-memory OrderRepository for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::{Order, PaymentSettlement};
use crate::ports::OrderRepository;

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
    failures_remaining: AtomicUsize,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Makes the next `count` calls to `settle_pending` fail with a database error.
    pub fn fail_next_settlements(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<Order> {
        self.orders.read().await.values().cloned().collect()
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), DomainError> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_by_customer(&self, stripe_customer_id: &str) -> Result<Vec<Order>, DomainError> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.stripe_customer_id == stripe_customer_id)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.created_at);
        Ok(found)
    }

    async fn settle_pending(
        &self,
        stripe_customer_id: &str,
        settlement: &PaymentSettlement,
    ) -> Result<u64, DomainError> {
        if self.take_failure() {
            return Err(DomainError::database("injected settlement failure"));
        }

        let mut orders = self.orders.write().await;
        let mut changed = 0;
        for order in orders
            .values_mut()
            .filter(|o| o.is_settleable_by(stripe_customer_id))
        {
            order.settle(settlement)?;
            changed += 1;
        }
        Ok(changed)
    }
}
