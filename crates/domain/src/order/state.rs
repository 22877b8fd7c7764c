//! Order lifecycle states.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// ```text
/// New ──► Open ──► Locked ──► Ordered ──► Delivered ──► Archived
///  │        │       │  ▲         │
///  │        │       └──┘ reopen  │
///  └────────┴───────┴────────────┴──► Revoked ──► (removed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Created, no line items yet.
    #[default]
    New,

    /// Collecting line items.
    Open,

    /// Someone is placing the order; line items are frozen.
    Locked,

    /// The restaurant has the order.
    Ordered,

    /// Food arrived; payments are being settled.
    Delivered,

    /// Done (terminal state).
    Archived,

    /// Called off; removed once its grace period ends.
    Revoked,
}

impl OrderState {
    pub const ALL: [OrderState; 7] = [
        OrderState::New,
        OrderState::Open,
        OrderState::Locked,
        OrderState::Ordered,
        OrderState::Delivered,
        OrderState::Archived,
        OrderState::Revoked,
    ];

    /// Returns true if line items can be added, edited freely and removed.
    pub fn can_edit_positions(&self) -> bool {
        matches!(self, OrderState::New | OrderState::Open)
    }

    /// Returns true if payments and tips can still be recorded.
    pub fn can_record_payments(&self) -> bool {
        matches!(
            self,
            OrderState::New
                | OrderState::Open
                | OrderState::Locked
                | OrderState::Ordered
                | OrderState::Delivered
        )
    }

    /// Returns true if the order infos can be changed.
    pub fn can_edit_infos(&self) -> bool {
        matches!(self, OrderState::New | OrderState::Open)
    }

    /// Returns true while the group is still gathering or placing the order.
    pub fn is_collecting(&self) -> bool {
        matches!(self, OrderState::New | OrderState::Open | OrderState::Locked)
    }

    /// Returns true for states that end the order's active life.
    pub fn is_closed(&self) -> bool {
        matches!(self, OrderState::Archived | OrderState::Revoked)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Archived)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::New => "New",
            OrderState::Open => "Open",
            OrderState::Locked => "Locked",
            OrderState::Ordered => "Ordered",
            OrderState::Delivered => "Delivered",
            OrderState::Archived => "Archived",
            OrderState::Revoked => "Revoked",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
