//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod schedule;
mod service;
mod state;
mod summary;
mod transition;
mod value_objects;

pub use aggregate::Order;
pub use commands::{CreateOrder, NewPosition, PositionPatch};
pub use events::{
    OrderCreatedData, OrderEvent, PositionRemovedData, RemovedData, TransitionedData,
};
pub use schedule::{ScheduledTransition, StateManagement};
pub use service::OrderService;
pub use state::OrderState;
pub use summary::OrderSummary;
pub use transition::{Guard, Target, Trigger};
pub use value_objects::{Money, MoneyCollectionType, OrderInfos, OrderPosition};

use common::PositionId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The state graph has no such edge.
    #[error("Illegal transition: cannot {trigger} from {from} state")]
    IllegalTransition { from: OrderState, trigger: Trigger },

    /// The edge exists but a precondition is unmet.
    #[error("Guard violation: {0}")]
    GuardViolation(Guard),

    /// The operation is not a transition and the current state forbids it.
    #[error("Cannot {action} in {state} state")]
    WrongState {
        state: OrderState,
        action: &'static str,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),
}

impl From<Guard> for OrderError {
    fn from(guard: Guard) -> Self {
        OrderError::GuardViolation(guard)
    }
}

/// Malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name is required")]
    NameRequired,

    #[error("meal is required")]
    MealRequired,

    #[error("price must be greater than 0, got {0}")]
    NonPositivePrice(Money),

    #[error("{field} must not be negative, got {amount}")]
    NegativeAmount { field: &'static str, amount: Money },

    #[error("{field} must not exceed {max}, got {amount}", max = Money::MAX_AMOUNT)]
    AmountTooLarge { field: &'static str, amount: Money },

    #[error("maximum position count must be greater than 0")]
    ZeroMaximumPositionCount,

    #[error("maximum position count {maximum} is below the current {current} positions")]
    MaximumBelowCurrent { maximum: u32, current: usize },

    #[error("order already holds the maximum of {maximum} positions")]
    TooManyPositions { maximum: u32 },
}
