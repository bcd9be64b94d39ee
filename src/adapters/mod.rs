//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum endpoints
//! - `memory` - In-memory stores for tests and local runs
//! - `postgres` - PostgreSQL persistence

pub mod http;
pub mod memory;
pub mod postgres;

pub use memory::{InMemoryInboundEventStore, InMemoryOrderRepository};
pub use postgres::{PostgresInboundEventStore, PostgresOrderRepository};
