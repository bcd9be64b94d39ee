//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresInboundEventStore` - `stripe_events` table
//! - `PostgresOrderRepository` - `orders` table

mod inbound_event_store;
mod order_repository;

pub use inbound_event_store::PostgresInboundEventStore;
pub use order_repository::PostgresOrderRepository;
