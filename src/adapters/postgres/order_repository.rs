//! PostgreSQL implementation of OrderRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, OrderId, Timestamp};
use crate::domain::order::{Order, OrderStatus, PaymentSettlement};
use crate::ports::OrderRepository;

pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an order.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    stripe_customer_id: String,
    status: String,
    amount_cents: i64,
    stripe_invoice_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderId::from_uuid(row.id),
            stripe_customer_id: row.stripe_customer_id,
            status: parse_status(&row.status)?,
            amount_cents: row.amount_cents,
            stripe_invoice_id: row.stripe_invoice_id,
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_status(s: &str) -> Result<OrderStatus, DomainError> {
    s.parse().map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid order status value: {}", s),
        )
    })
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, e))
}

const SELECT_ORDER: &str = r#"
    SELECT id, stripe_customer_id, status, amount_cents, stripe_invoice_id,
           paid_at, created_at, updated_at
    FROM orders
"#;

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, stripe_customer_id, status, amount_cents, stripe_invoice_id,
                paid_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                status = EXCLUDED.status,
                amount_cents = EXCLUDED.amount_cents,
                stripe_invoice_id = EXCLUDED.stripe_invoice_id,
                paid_at = EXCLUDED.paid_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.stripe_customer_id)
        .bind(order.status.as_str())
        .bind(order.amount_cents)
        .bind(&order.stripe_invoice_id)
        .bind(order.paid_at.map(|t| *t.as_datetime()))
        .bind(order.created_at.as_datetime())
        .bind(order.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save order", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_ORDER))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find order", e))?;

        row.map(Order::try_from).transpose()
    }

    async fn find_by_customer(&self, stripe_customer_id: &str) -> Result<Vec<Order>, DomainError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "{} WHERE stripe_customer_id = $1 ORDER BY created_at ASC",
            SELECT_ORDER
        ))
        .bind(stripe_customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find orders by customer", e))?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn settle_pending(
        &self,
        stripe_customer_id: &str,
        settlement: &PaymentSettlement,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3,
                stripe_invoice_id = $4,
                paid_at = COALESCE($5, paid_at),
                updated_at = NOW()
            WHERE stripe_customer_id = $1 AND status = $2
            "#,
        )
        .bind(stripe_customer_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(settlement.target_status().as_str())
        .bind(settlement.invoice_id())
        .bind(settlement.paid_at().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to settle pending orders", e))?;

        Ok(result.rows_affected())
    }
}
