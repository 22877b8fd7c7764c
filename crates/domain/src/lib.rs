//! Domain layer for group meal orders.
//!
//! This crate provides:
//! - The `Order` aggregate with its state machine and transition table
//! - Financial reconciliation (`OrderSummary`) derived from line items
//! - `OrderGuard`, the versioned write path every mutation goes through
//! - `OrderService`, the command surface, and change notification

pub mod config;
pub mod error;
pub mod guard;
pub mod notify;
pub mod order;

pub use config::{OrderConfig, StateTimeouts};
pub use error::DomainError;
pub use guard::{CommandResult, OrderGuard};
pub use notify::{BroadcastNotifier, ChangeNotifier, NoopNotifier, OrdersChanged};
pub use order::{
    CreateOrder, Guard, Money, MoneyCollectionType, NewPosition, Order, OrderError, OrderEvent,
    OrderInfos, OrderPosition, OrderService, OrderState, OrderSummary, PositionPatch,
    ScheduledTransition, StateManagement, Target, Trigger, ValidationError,
};
