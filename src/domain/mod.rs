//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `order` - Order aggregate and payment settlement
//! - `webhook` - Stripe webhook verification, idempotency and dispatch

pub mod foundation;
pub mod order;
pub mod webhook;
