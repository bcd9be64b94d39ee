//! In-memory adapters for tests and local development.

mod inbound_event_store;
mod order_repository;

pub use inbound_event_store::InMemoryInboundEventStore;
pub use order_repository::InMemoryOrderRepository;
