//! Order domain module.
//!
//! - `aggregate` - Order entity and `PaymentSettlement`
//! - `status` - OrderStatus state machine
//! - `state_updater` - Bulk settlement of pending orders from invoice events

mod aggregate;
mod state_updater;
mod status;

pub use aggregate::{Order, PaymentSettlement};
pub use state_updater::OrderStateUpdater;
pub use status::OrderStatus;
