//! Order command payloads.

use chrono::NaiveDate;
use common::{OrderId, RestaurantId};
use serde::{Deserialize, Serialize};

use super::Money;

/// Command to create a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    /// The order ID to create.
    #[serde(default)]
    pub order_id: OrderId,

    pub restaurant_id: RestaurantId,

    /// The day the group eats.
    pub target_date: NaiveDate,
}

impl CreateOrder {
    /// Creates a new CreateOrder command with a generated order ID.
    pub fn new(restaurant_id: RestaurantId, target_date: NaiveDate) -> Self {
        Self {
            order_id: OrderId::new(),
            restaurant_id,
            target_date,
        }
    }
}

/// A line item to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosition {
    pub name: String,
    pub meal: String,
    pub price: Money,
    #[serde(default)]
    pub paid: Option<Money>,
    #[serde(default)]
    pub tip: Option<Money>,
}

impl NewPosition {
    pub fn new(name: impl Into<String>, meal: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            meal: meal.into(),
            price,
            paid: None,
            tip: None,
        }
    }

    pub fn with_tip(mut self, tip: Money) -> Self {
        self.tip = Some(tip);
        self
    }

    pub fn with_paid(mut self, paid: Money) -> Self {
        self.paid = Some(paid);
        self
    }
}

/// Changes to an existing line item. Absent fields stay as they are.
///
/// Once an order is locked only `paid` and `tip` may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub meal: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub paid: Option<Money>,
    #[serde(default)]
    pub tip: Option<Money>,
}

impl PositionPatch {
    /// A patch recording a payment.
    pub fn paid(amount: Money) -> Self {
        Self {
            paid: Some(amount),
            ..Default::default()
        }
    }

    pub fn with_tip(mut self, tip: Money) -> Self {
        self.tip = Some(tip);
        self
    }
}
