//! The order state graph as an explicit transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Money, OrderState};

/// What asks an order to change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The first line item was added to a new order.
    FirstPosition,
    /// "Start ordering": freeze the line items.
    StartOrdering,
    /// Unfreeze a locked order. Manual, or automatic after the lock timeout.
    Reopen,
    MarkOrdered,
    /// Manual, or automatic after the ordered timeout.
    MarkDelivered,
    /// Manual, or automatic after the delivered timeout.
    Archive,
    Revoke,
    /// Manual removal of an order nobody joined.
    Delete,
    /// Automatic removal of an untouched or revoked order.
    Expire,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::FirstPosition => "first_position",
            Trigger::StartOrdering => "start_ordering",
            Trigger::Reopen => "reopen",
            Trigger::MarkOrdered => "mark_ordered",
            Trigger::MarkDelivered => "mark_delivered",
            Trigger::Archive => "archive",
            Trigger::Revoke => "revoke",
            Trigger::Delete => "delete",
            Trigger::Expire => "expire",
        }
    }

    /// Returns the edge this trigger takes from `from`, if there is one.
    pub fn target(&self, from: OrderState) -> Option<Target> {
        use OrderState::*;

        match self {
            Trigger::FirstPosition => matches!(from, New).then_some(Target::State(Open)),
            Trigger::StartOrdering => matches!(from, New | Open).then_some(Target::State(Locked)),
            Trigger::Reopen => matches!(from, Locked).then_some(Target::State(Open)),
            Trigger::MarkOrdered => matches!(from, Locked).then_some(Target::State(Ordered)),
            Trigger::MarkDelivered => matches!(from, Ordered).then_some(Target::State(Delivered)),
            Trigger::Archive => matches!(from, Delivered).then_some(Target::State(Archived)),
            Trigger::Revoke => {
                matches!(from, New | Open | Locked | Ordered).then_some(Target::State(Revoked))
            }
            Trigger::Delete => matches!(from, New).then_some(Target::Removed),
            Trigger::Expire => matches!(from, New | Open | Revoked).then_some(Target::Removed),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a transition leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    State(OrderState),
    /// The order is deleted.
    Removed,
}

/// A precondition of a transition that the order does not meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "guard", rename_all = "snake_case")]
pub enum Guard {
    #[error("no orderer set")]
    OrdererMissing,

    #[error("no fetcher set")]
    FetcherMissing,

    #[error("no money collector set")]
    MoneyCollectorMissing,

    #[error("order fee not covered by tips, {remaining_fee} remaining")]
    FeeNotSatisfied { remaining_fee: Money },

    #[error("automatic transition not due before {due_at}")]
    DeadlineNotReached { due_at: DateTime<Utc> },

    #[error("no automatic {trigger} transition scheduled")]
    NotScheduled { trigger: Trigger },
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIGGERS: [Trigger; 9] = [
        Trigger::FirstPosition,
        Trigger::StartOrdering,
        Trigger::Reopen,
        Trigger::MarkOrdered,
        Trigger::MarkDelivered,
        Trigger::Archive,
        Trigger::Revoke,
        Trigger::Delete,
        Trigger::Expire,
    ];

    #[test]
    fn test_table_edges() {
        use OrderState::*;

        let mut edges = Vec::new();
        for from in OrderState::ALL {
            for trigger in TRIGGERS {
                if let Some(target) = trigger.target(from) {
                    edges.push((from, trigger, target));
                }
            }
        }

        let expected = vec![
            (New, Trigger::FirstPosition, Target::State(Open)),
            (New, Trigger::StartOrdering, Target::State(Locked)),
            (New, Trigger::Revoke, Target::State(Revoked)),
            (New, Trigger::Delete, Target::Removed),
            (New, Trigger::Expire, Target::Removed),
            (Open, Trigger::StartOrdering, Target::State(Locked)),
            (Open, Trigger::Revoke, Target::State(Revoked)),
            (Open, Trigger::Expire, Target::Removed),
            (Locked, Trigger::Reopen, Target::State(Open)),
            (Locked, Trigger::MarkOrdered, Target::State(Ordered)),
            (Locked, Trigger::Revoke, Target::State(Revoked)),
            (Ordered, Trigger::MarkDelivered, Target::State(Delivered)),
            (Ordered, Trigger::Revoke, Target::State(Revoked)),
            (Delivered, Trigger::Archive, Target::State(Archived)),
            (Revoked, Trigger::Expire, Target::Removed),
        ];
        assert_eq!(edges, expected);
    }

    #[test]
    fn test_archived_has_no_way_out() {
        assert!(TRIGGERS.iter().all(|t| t.target(OrderState::Archived).is_none()));
    }

    #[test]
    fn test_trigger_serializes_snake_case() {
        for trigger in TRIGGERS {
            let json = serde_json::to_string(&trigger).unwrap();
            assert_eq!(json, format!("\"{trigger}\""));
        }
    }

    #[test]
    fn test_guard_messages_name_the_condition() {
        let guard = Guard::FeeNotSatisfied {
            remaining_fee: Money::from_cents(50),
        };
        assert_eq!(
            guard.to_string(),
            "order fee not covered by tips, 0.50 remaining"
        );
    }
}
