//! PostgreSQL implementation of InboundEventStore.
//!
//! Backed by the `stripe_events` table. The unique index on `event_id`
//! arbitrates concurrent deliveries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::webhook::InboundEvent;
use crate::ports::{InboundEventStore, InsertOutcome};

pub struct PostgresInboundEventStore {
    pool: PgPool,
}

impl PostgresInboundEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a stripe event.
#[derive(Debug, sqlx::FromRow)]
struct StripeEventRow {
    event_id: String,
    event_type: String,
    payload: serde_json::Value,
    processed: bool,
    claimed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StripeEventRow> for InboundEvent {
    fn from(row: StripeEventRow) -> Self {
        InboundEvent {
            event_id: row.event_id,
            event_type: row.event_type,
            payload: row.payload,
            processed: row.processed,
            claimed_at: row.claimed_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, e))
}

#[async_trait]
impl InboundEventStore for PostgresInboundEventStore {
    async fn insert_if_absent(&self, event: &InboundEvent) -> Result<InsertOutcome, DomainError> {
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO stripe_events
                (event_id, event_type, payload, processed, claimed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.processed)
        .bind(event.created_at.as_datetime())
        .bind(event.updated_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record stripe event", e))?;

        if inserted.is_some() {
            return Ok(InsertOutcome::Inserted);
        }

        let processed: Option<bool> =
            sqlx::query_scalar("SELECT processed FROM stripe_events WHERE event_id = $1")
                .bind(&event.event_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read stripe event", e))?;

        match processed {
            Some(true) => Ok(InsertOutcome::AlreadyProcessed),
            Some(false) => Ok(InsertOutcome::Unprocessed),
            None => Err(DomainError::new(
                ErrorCode::EventNotFound,
                format!("Stripe event {} vanished after insert conflict", event.event_id),
            )),
        }
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<InboundEvent>, DomainError> {
        let row: Option<StripeEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, payload, processed, claimed_at, created_at, updated_at
            FROM stripe_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find stripe event", e))?;

        Ok(row.map(InboundEvent::from))
    }

    async fn try_claim(
        &self,
        event_id: &str,
        stale_before: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE stripe_events
            SET claimed_at = NOW(), updated_at = NOW()
            WHERE event_id = $1
              AND processed = FALSE
              AND (claimed_at IS NULL OR claimed_at < $2)
            "#,
        )
        .bind(event_id)
        .bind(stale_before.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to claim stripe event", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, event_id: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE stripe_events
            SET claimed_at = NULL, updated_at = NOW()
            WHERE event_id = $1 AND processed = FALSE
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to release stripe event claim", e))?;

        Ok(())
    }

    async fn mark_processed(&self, event_id: &str) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE stripe_events
            SET processed = TRUE, updated_at = NOW()
            WHERE event_id = $1 AND processed = FALSE
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark stripe event processed", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_unprocessed(
        &self,
        older_than: Timestamp,
        limit: u32,
    ) -> Result<Vec<InboundEvent>, DomainError> {
        let rows: Vec<StripeEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, payload, processed, claimed_at, created_at, updated_at
            FROM stripe_events
            WHERE processed = FALSE AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(older_than.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list unprocessed stripe events", e))?;

        Ok(rows.into_iter().map(InboundEvent::from).collect())
    }
}
