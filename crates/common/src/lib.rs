//! Shared types for the meal-order coordination system.
//!
//! - Typed identifiers for orders, line items and restaurants
//! - The [`Clock`] collaborator used wherever the core needs "now"

pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use types::{OrderId, PositionId, RestaurantId};
