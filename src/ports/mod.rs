//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `InboundEventStore` - Stripe event record and idempotency tracking
//! - `OrderRepository` - Order persistence and bulk settlement

mod inbound_event_store;
mod order_repository;

pub use inbound_event_store::{InboundEventStore, InsertOutcome};
pub use order_repository::OrderRepository;
