//! Order service providing the command surface for order operations.

use std::sync::Arc;

use common::{Clock, OrderId, PositionId};
use order_store::{OrderStore, Version};

use crate::config::OrderConfig;
use crate::error::DomainError;
use crate::guard::{CommandResult, OrderGuard};
use crate::notify::{ChangeNotifier, NoopNotifier, OrdersChanged};

use super::{
    CreateOrder, NewPosition, Order, OrderError, OrderEvent, OrderInfos, PositionPatch, Trigger,
};

/// Service for managing orders.
///
/// Every mutating method takes the version the caller last saw and fails
/// with a version conflict if the order has moved on since. Successful
/// mutations are announced through the configured [`ChangeNotifier`].
pub struct OrderService<S: OrderStore> {
    guard: OrderGuard<S>,
    config: OrderConfig,
    notifier: Arc<dyn ChangeNotifier>,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service that announces changes nowhere.
    pub fn new(store: S, clock: Arc<dyn Clock>, config: OrderConfig) -> Self {
        Self {
            guard: OrderGuard::new(store, clock, config.timeouts),
            config,
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Sends change announcements to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Returns a reference to the underlying guard.
    pub fn guard(&self) -> &OrderGuard<S> {
        &self.guard
    }

    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    /// Creates a new order in state `New` at version 1.
    #[tracing::instrument(skip(self))]
    ///
    /// Refuses a second order for the same restaurant and day while the
    /// first is still collecting. The check reads a snapshot, so two
    /// simultaneous creates can both pass it.
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let duplicate = self.guard.load_all().await?.into_iter().find(|order| {
            order.restaurant_id() == cmd.restaurant_id
                && order.target_date() == cmd.target_date
                && order.state().is_collecting()
        });
        if let Some(existing) = duplicate {
            tracing::debug!(existing = %existing.id(), "order already collecting");
            return Err(DomainError::AlreadyExists {
                existing: existing.id(),
                restaurant_id: cmd.restaurant_id,
                target_date: cmd.target_date,
            });
        }

        let result = self.guard.create(&cmd).await?;
        self.announce("create_order", &result);
        Ok(result.order)
    }

    /// Loads one order.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.guard
            .load(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Lists orders newest first, hiding orders closed longer than the
    /// configured lingering time.
    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        let now = self.guard.now();
        let lingering = self.config.closed_order_lingering;
        Ok(self
            .guard
            .load_all()
            .await?
            .into_iter()
            .filter(|order| order.is_listed(now, lingering))
            .collect())
    }

    /// Lists orders whose automatic transition has come due.
    pub async fn due_orders(&self) -> Result<Vec<Order>, DomainError> {
        self.guard.load_due().await
    }

    /// Replaces the orderer, fetcher, fee and other infos.
    #[tracing::instrument(skip(self, infos))]
    pub async fn set_infos(
        &self,
        order_id: OrderId,
        expected: Version,
        infos: OrderInfos,
    ) -> Result<Order, DomainError> {
        self.run("set_infos", order_id, expected, |order, _| {
            order.set_infos(infos)
        })
        .await
        .map(|result| result.order)
    }

    /// Adds a line item.
    #[tracing::instrument(skip(self))]
    pub async fn add_position(
        &self,
        order_id: OrderId,
        expected: Version,
        position: NewPosition,
    ) -> Result<Order, DomainError> {
        self.run("add_position", order_id, expected, |order, now| {
            order.add_position(position, now)
        })
        .await
        .map(|result| result.order)
    }

    /// Changes a line item.
    #[tracing::instrument(skip(self))]
    pub async fn update_position(
        &self,
        order_id: OrderId,
        expected: Version,
        position_id: PositionId,
        patch: PositionPatch,
    ) -> Result<Order, DomainError> {
        self.run("update_position", order_id, expected, |order, _| {
            order.update_position(position_id, patch)
        })
        .await
        .map(|result| result.order)
    }

    /// Removes a line item.
    #[tracing::instrument(skip(self))]
    pub async fn remove_position(
        &self,
        order_id: OrderId,
        expected: Version,
        position_id: PositionId,
    ) -> Result<Order, DomainError> {
        self.run("remove_position", order_id, expected, |order, _| {
            order.remove_position(position_id)
        })
        .await
        .map(|result| result.order)
    }

    /// Moves the order along the edge selected by `trigger`.
    ///
    /// This is the one entrypoint for state changes, whether a person or
    /// the scheduler asks for them.
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        expected: Version,
        trigger: Trigger,
    ) -> Result<CommandResult, DomainError> {
        self.run(trigger.as_str(), order_id, expected, |order, now| {
            order.transition(trigger, now)
        })
        .await
    }

    /// "Start ordering": lock the line items.
    pub async fn start_ordering(
        &self,
        order_id: OrderId,
        expected: Version,
    ) -> Result<CommandResult, DomainError> {
        self.transition(order_id, expected, Trigger::StartOrdering)
            .await
    }

    pub async fn reopen(
        &self,
        order_id: OrderId,
        expected: Version,
    ) -> Result<CommandResult, DomainError> {
        self.transition(order_id, expected, Trigger::Reopen).await
    }

    pub async fn mark_ordered(
        &self,
        order_id: OrderId,
        expected: Version,
    ) -> Result<CommandResult, DomainError> {
        self.transition(order_id, expected, Trigger::MarkOrdered)
            .await
    }

    pub async fn mark_delivered(
        &self,
        order_id: OrderId,
        expected: Version,
    ) -> Result<CommandResult, DomainError> {
        self.transition(order_id, expected, Trigger::MarkDelivered)
            .await
    }

    pub async fn archive(
        &self,
        order_id: OrderId,
        expected: Version,
    ) -> Result<CommandResult, DomainError> {
        self.transition(order_id, expected, Trigger::Archive).await
    }

    pub async fn revoke(
        &self,
        order_id: OrderId,
        expected: Version,
    ) -> Result<CommandResult, DomainError> {
        self.transition(order_id, expected, Trigger::Revoke).await
    }

    /// Deletes an order nobody has joined yet.
    pub async fn delete(&self, order_id: OrderId, expected: Version) -> Result<(), DomainError> {
        self.transition(order_id, expected, Trigger::Delete)
            .await
            .map(|_| ())
    }

    async fn run<F>(
        &self,
        command: &'static str,
        order_id: OrderId,
        expected: Version,
        command_fn: F,
    ) -> Result<CommandResult, DomainError>
    where
        F: FnOnce(&Order, chrono::DateTime<chrono::Utc>) -> Result<Vec<OrderEvent>, OrderError>,
    {
        let result = self.guard.execute(order_id, expected, command_fn).await?;
        self.announce(command, &result);
        Ok(result)
    }

    fn announce(&self, command: &'static str, result: &CommandResult) {
        metrics::counter!("orders_mutations_total", "command" => command).increment(1);

        let order_id = result.order.id();
        let version = result.order.version();

        for event in &result.events {
            match event {
                OrderEvent::Transitioned(data) => {
                    tracing::info!(%order_id, from = %data.from, to = %data.to, trigger = %data.trigger, %version, "order transitioned");
                }
                OrderEvent::Removed(data) => {
                    tracing::info!(%order_id, from = %data.from, trigger = %data.trigger, "order removed");
                }
                _ => {}
            }

            self.notifier.notify(OrdersChanged {
                order_id,
                version,
                event: event.clone(),
            });
        }
    }
}
