//! Reconciler - Background sweep for stranded webhook events.
//!
//! Periodically runs [`ReconcileUnprocessedEvents`] over events that were
//! recorded but never marked processed.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 60s | How often to sweep |
//! | `min_age` | 300s | Events younger than this are left to Stripe redelivery |
//! | `batch_size` | 50 | Max events per sweep |
//!
//! ## Graceful Shutdown
//!
//! The loop listens on a watch channel and returns once it flips to true.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::{DomainError, Timestamp};

use super::handlers::webhook::{
    ReconcileEventsCommand, ReconcileEventsResult, ReconcileUnprocessedEvents,
};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub poll_interval: Duration,
    pub min_age: Duration,
    pub batch_size: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            min_age: Duration::from_secs(300),
            batch_size: 50,
        }
    }
}

pub struct Reconciler {
    sweep: ReconcileUnprocessedEvents,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(sweep: ReconcileUnprocessedEvents, config: ReconcilerConfig) -> Self {
        Self { sweep, config }
    }

    /// Run the sweep loop until shutdown signal is received.
    ///
    /// Sweep errors are logged; the loop keeps going.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            min_age_secs = self.config.min_age.as_secs(),
            "Reconciler started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Reconciler stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        }
    }

    /// Run exactly one sweep.
    pub async fn poll_once(&self) -> Result<ReconcileEventsResult, DomainError> {
        let cmd = ReconcileEventsCommand {
            older_than: Timestamp::now().minus_secs(self.config.min_age.as_secs()),
            limit: self.config.batch_size,
        };
        self.sweep.handle(cmd).await
    }
}
