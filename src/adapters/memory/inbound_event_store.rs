//! In-memory InboundEventStore for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::webhook::InboundEvent;
use crate::ports::{InboundEventStore, InsertOutcome};

/// Event store backed by a map keyed on `event_id`.
///
/// The write lock makes check-and-insert atomic, matching the unique
/// constraint of the Postgres table.
#[derive(Default)]
pub struct InMemoryInboundEventStore {
    events: RwLock<HashMap<String, InboundEvent>>,
}

impl InMemoryInboundEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl InboundEventStore for InMemoryInboundEventStore {
    async fn insert_if_absent(&self, event: &InboundEvent) -> Result<InsertOutcome, DomainError> {
        let mut events = self.events.write().await;
        match events.get(&event.event_id) {
            Some(existing) if existing.processed => Ok(InsertOutcome::AlreadyProcessed),
            Some(_) => Ok(InsertOutcome::Unprocessed),
            None => {
                let mut record = event.clone();
                record.claimed_at = Some(record.created_at);
                events.insert(record.event_id.clone(), record);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<InboundEvent>, DomainError> {
        Ok(self.events.read().await.get(event_id).cloned())
    }

    async fn try_claim(
        &self,
        event_id: &str,
        stale_before: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut events = self.events.write().await;
        let Some(event) = events.get_mut(event_id) else {
            return Ok(false);
        };
        let claimable = !event.processed
            && event
                .claimed_at
                .map_or(true, |claimed| claimed.is_before(&stale_before));
        if claimable {
            let now = Timestamp::now();
            event.claimed_at = Some(now);
            event.updated_at = now;
        }
        Ok(claimable)
    }

    async fn release_claim(&self, event_id: &str) -> Result<(), DomainError> {
        let mut events = self.events.write().await;
        if let Some(event) = events.get_mut(event_id).filter(|e| !e.processed) {
            event.claimed_at = None;
            event.updated_at = Timestamp::now();
        }
        Ok(())
    }

    async fn mark_processed(&self, event_id: &str) -> Result<bool, DomainError> {
        let mut events = self.events.write().await;
        Ok(events
            .get_mut(event_id)
            .map(InboundEvent::mark_processed)
            .unwrap_or(false))
    }

    async fn find_unprocessed(
        &self,
        older_than: Timestamp,
        limit: u32,
    ) -> Result<Vec<InboundEvent>, DomainError> {
        let events = self.events.read().await;
        let mut stranded: Vec<InboundEvent> = events
            .values()
            .filter(|e| !e.processed && e.created_at.is_before(&older_than))
            .cloned()
            .collect();
        stranded.sort_by_key(|e| e.created_at);
        stranded.truncate(limit as usize);
        Ok(stranded)
    }
}
