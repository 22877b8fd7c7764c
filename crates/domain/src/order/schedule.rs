//! Per-state timestamps and the next automatic transition.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OrderState, Trigger};
use crate::config::StateTimeouts;

/// The automatic follow-up of an order's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransition {
    /// When the scheduler may fire it.
    pub at: DateTime<Utc>,
    /// The configured timeout of the current state.
    pub duration: Duration,
    pub trigger: Trigger,
}

impl ScheduledTransition {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.at
    }
}

/// When the order entered each state, plus its next automatic transition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateManagement {
    pub locked_at: Option<DateTime<Utc>>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub next_transition: Option<ScheduledTransition>,
}

impl StateManagement {
    /// Records entering `state` at `at`.
    pub fn record(&mut self, state: OrderState, at: DateTime<Utc>) {
        match state {
            OrderState::New => {}
            // reopened
            OrderState::Open => self.locked_at = None,
            OrderState::Locked => self.locked_at = Some(at),
            OrderState::Ordered => self.ordered_at = Some(at),
            OrderState::Delivered => self.delivered_at = Some(at),
            OrderState::Archived => self.archived_at = Some(at),
            OrderState::Revoked => self.revoked_at = Some(at),
        }
    }

    /// When the order was archived or revoked, if it was.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.archived_at.or(self.revoked_at)
    }

    /// Recomputes the next automatic transition for `state`.
    ///
    /// `New`/`Open` count from the last modification, every other state
    /// from the moment it was entered. `Archived` has no follow-up.
    pub fn reschedule(
        &mut self,
        state: OrderState,
        updated_at: DateTime<Utc>,
        timeouts: &StateTimeouts,
    ) {
        let plan = match state {
            OrderState::New | OrderState::Open => {
                Some((Some(updated_at), timeouts.open, Trigger::Expire))
            }
            OrderState::Locked => Some((self.locked_at, timeouts.locked, Trigger::Reopen)),
            OrderState::Ordered => Some((self.ordered_at, timeouts.ordered, Trigger::MarkDelivered)),
            OrderState::Delivered => Some((self.delivered_at, timeouts.delivered, Trigger::Archive)),
            OrderState::Revoked => Some((self.revoked_at, timeouts.revoked, Trigger::Expire)),
            OrderState::Archived => None,
        };

        self.next_transition = plan.map(|(since, duration, trigger)| ScheduledTransition {
            at: deadline(since.unwrap_or(updated_at), duration),
            duration,
            trigger,
        });
    }
}

fn deadline(since: DateTime<Utc>, after: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(after)
        .ok()
        .and_then(|after| since.checked_add_signed(after))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
