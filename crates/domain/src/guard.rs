//! Versioned command execution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Clock, OrderId};
use order_store::{OrderRecord, OrderStore, OrderStoreExt, StoreError, Version};

use crate::config::StateTimeouts;
use crate::error::DomainError;
use crate::order::{CreateOrder, Order, OrderError, OrderEvent};

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The order after applying the new events. For a removal, the order as
    /// it was when deleted.
    pub order: Order,

    /// The events that were applied.
    pub events: Vec<OrderEvent>,

    /// True if the command deleted the order.
    pub removed: bool,
}

impl CommandResult {
    /// The version now stored, or `None` if the order is gone.
    pub fn new_version(&self) -> Option<Version> {
        (!self.removed).then(|| self.order.version())
    }
}

/// Runs commands against stored orders under optimistic concurrency.
///
/// The guard is responsible for:
/// 1. Loading the order and rejecting a stale expected version up front
/// 2. Running the command to produce events
/// 3. Applying them, bumping the version by one and rescheduling
/// 4. Writing back with a compare-and-swap on the expected version
///
/// Manual commands and the scheduler both come through here; there is no
/// other write path and no lock.
pub struct OrderGuard<S: OrderStore> {
    store: S,
    clock: Arc<dyn Clock>,
    timeouts: StateTimeouts,
}

impl<S: OrderStore> OrderGuard<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, timeouts: StateTimeouts) -> Self {
        Self {
            store,
            clock,
            timeouts,
        }
    }

    /// Returns a reference to the underlying order store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn timeouts(&self) -> &StateTimeouts {
        &self.timeouts
    }

    /// Loads an order, returning None if it doesn't exist.
    pub async fn load(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        self.store
            .load(order_id)
            .await?
            .map(decode)
            .transpose()
    }

    /// Loads every stored order, newest first.
    pub async fn load_all(&self) -> Result<Vec<Order>, DomainError> {
        self.store.list().await?.into_iter().map(decode).collect()
    }

    /// Loads the orders whose automatic transition is due now.
    pub async fn load_due(&self) -> Result<Vec<Order>, DomainError> {
        self.store
            .due(self.now())
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Creates and stores a new order at version 1.
    pub async fn create(&self, cmd: &CreateOrder) -> Result<CommandResult, DomainError> {
        let now = self.now();
        let (mut order, event) = Order::create(cmd, now);
        order.touch(Version::first(), now, &self.timeouts);

        self.store
            .insert(encode(&order)?)
            .await
            .map_err(count_conflict)?;

        Ok(CommandResult {
            order,
            events: vec![event],
            removed: false,
        })
    }

    /// Executes a command against the order at `expected` version.
    ///
    /// The command receives the current order and the current time and
    /// returns the events to apply, or an error. Nothing is written when it
    /// fails or yields no events.
    pub async fn execute<F>(
        &self,
        order_id: OrderId,
        expected: Version,
        command_fn: F,
    ) -> Result<CommandResult, DomainError>
    where
        F: FnOnce(&Order, DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError>,
    {
        let now = self.now();
        let record = self.store.load_existing(order_id).await?;

        if record.version != expected {
            return Err(count_conflict(StoreError::VersionConflict {
                order_id,
                expected,
                actual: record.version,
            }));
        }

        let mut order = decode(record)?;
        let events = command_fn(&order, now)?;

        if events.is_empty() {
            return Ok(CommandResult {
                order,
                events,
                removed: false,
            });
        }

        for event in &events {
            order.apply(event.clone());
        }

        let removed = events.iter().any(|e| matches!(e, OrderEvent::Removed(_)));
        if removed {
            self.store
                .delete_if_version_matches(order_id, expected)
                .await
                .map_err(count_conflict)?;
        } else {
            order.touch(expected.next(), now, &self.timeouts);
            self.store
                .save_if_version_matches(encode(&order)?, expected)
                .await
                .map_err(count_conflict)?;
        }

        Ok(CommandResult {
            order,
            events,
            removed,
        })
    }
}

fn count_conflict(e: StoreError) -> DomainError {
    if e.is_version_conflict() {
        metrics::counter!("orders_version_conflicts_total").increment(1);
    }
    e.into()
}

fn decode(record: OrderRecord) -> Result<Order, DomainError> {
    Ok(serde_json::from_value(record.document)?)
}

fn encode(order: &Order) -> Result<OrderRecord, DomainError> {
    Ok(OrderRecord::builder()
        .order_id(order.id())
        .version(order.version())
        .state(order.state().as_str())
        .next_transition_at(order.next_transition().map(|t| t.at))
        .created_at(order.created_at())
        .updated_at(order.updated_at())
        .document(order)?
        .build()?)
}
