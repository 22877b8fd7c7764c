//! Order domain events.
//!
//! Commands on [`Order`](super::Order) produce these; applying them is the
//! only way order state changes. They are also what change listeners see.

use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, PositionId, RestaurantId};
use serde::{Deserialize, Serialize};

use super::{OrderInfos, OrderPosition, OrderState, Trigger};

/// Events that can occur on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created.
    OrderCreated(OrderCreatedData),

    /// Orderer, fetcher, fee or other infos changed.
    InfosUpdated(OrderInfos),

    /// A line item was added.
    PositionAdded(OrderPosition),

    /// A line item changed; carries the item as it is now.
    PositionUpdated(OrderPosition),

    /// A line item was removed.
    PositionRemoved(PositionRemovedData),

    /// The order moved along an edge of the state graph.
    Transitioned(TransitionedData),

    /// The order was deleted.
    Removed(RemovedData),
}

impl OrderEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::InfosUpdated(_) => "InfosUpdated",
            OrderEvent::PositionAdded(_) => "PositionAdded",
            OrderEvent::PositionUpdated(_) => "PositionUpdated",
            OrderEvent::PositionRemoved(_) => "PositionRemoved",
            OrderEvent::Transitioned(_) => "Transitioned",
            OrderEvent::Removed(_) => "Removed",
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    pub restaurant_id: RestaurantId,
    /// The day the group eats.
    pub target_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Data for PositionRemoved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRemovedData {
    pub position_id: PositionId,
}

/// Data for Transitioned event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionedData {
    pub from: OrderState,
    pub to: OrderState,
    pub trigger: Trigger,
    pub at: DateTime<Utc>,
}

/// Data for Removed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedData {
    pub from: OrderState,
    pub trigger: Trigger,
    pub at: DateTime<Utc>,
}
