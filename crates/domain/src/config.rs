//! Order timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long an order may sit in each state before the scheduler moves it on.
///
/// There are no defaults; every deployment configures its own values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTimeouts {
    /// Untouched `New`/`Open` orders are removed after this long.
    pub open: Duration,
    /// `Locked` orders reopen after this long.
    pub locked: Duration,
    /// `Ordered` orders count as delivered after this long.
    pub ordered: Duration,
    /// `Delivered` orders are archived after this long.
    pub delivered: Duration,
    /// `Revoked` orders are removed after this long.
    pub revoked: Duration,
}

impl StateTimeouts {
    /// Uses the same timeout for every state. Handy in tests.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            open: timeout,
            locked: timeout,
            ordered: timeout,
            delivered: timeout,
            revoked: timeout,
        }
    }
}

/// Everything the order service needs to know about time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfig {
    pub timeouts: StateTimeouts,
    /// How long archived and revoked orders stay visible in listings.
    pub closed_order_lingering: Duration,
}

impl OrderConfig {
    pub fn new(timeouts: StateTimeouts, closed_order_lingering: Duration) -> Self {
        Self {
            timeouts,
            closed_order_lingering,
        }
    }
}
