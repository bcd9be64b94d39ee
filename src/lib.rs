//! Order webhooks - Stripe webhook ingestion for order payments.
//!
//! Verifies Stripe signatures, records each event once by its id, and applies
//! invoice outcomes to the customer's pending orders.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
