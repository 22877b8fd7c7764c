//! Value objects for the order domain.

use chrono::NaiveTime;
use common::PositionId;
use serde::{Deserialize, Serialize};

/// Money amount in minor currency units (cents) to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Largest amount a single price, payment, tip or fee may carry
    /// (1,000,000.00). Sums over `u32::MAX` such amounts stay within `i64`.
    pub const MAX_AMOUNT: Money = Money(100_000_000);

    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (remainder after whole units).
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns true if the amount lies outside `0..=MAX_AMOUNT`.
    pub fn is_out_of_range(&self) -> bool {
        self.is_negative() || *self > Self::MAX_AMOUNT
    }

    /// Returns `self - other`, or zero if that would be negative.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// How the money collector gets paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoneyCollectionType {
    #[default]
    Cash,
    Electronic,
}

/// Organisational details of an order: who does what, and the fee.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderInfos {
    /// Person placing the order with the restaurant.
    #[serde(default)]
    pub orderer: Option<String>,

    /// Person picking the food up.
    #[serde(default)]
    pub fetcher: Option<String>,

    /// Person collecting the money from participants.
    #[serde(default)]
    pub money_collector: Option<String>,

    #[serde(default)]
    pub money_collection_type: MoneyCollectionType,

    /// Time of day at which the group intends to stop taking line items.
    #[serde(default)]
    pub order_closing_time: Option<NaiveTime>,

    /// Delivery or ordering surcharge, funded from tips.
    #[serde(default)]
    pub order_fee: Money,

    /// Upper bound on the number of line items, if any.
    #[serde(default)]
    pub maximum_position_count: Option<u32>,

    #[serde(default)]
    pub note: Option<String>,
}

impl OrderInfos {
    pub fn has_orderer(&self) -> bool {
        is_set(&self.orderer)
    }

    pub fn has_fetcher(&self) -> bool {
        is_set(&self.fetcher)
    }

    pub fn has_money_collector(&self) -> bool {
        is_set(&self.money_collector)
    }
}

fn is_set(name: &Option<String>) -> bool {
    name.as_deref().is_some_and(|n| !n.trim().is_empty())
}

/// One participant's line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPosition {
    pub id: PositionId,

    /// Participant who wants the meal.
    pub name: String,

    pub meal: String,

    pub price: Money,

    /// Amount handed to the money collector, if any yet.
    #[serde(default)]
    pub paid: Option<Money>,

    #[serde(default)]
    pub tip: Option<Money>,

    /// Stable display position.
    pub index: u32,
}

impl OrderPosition {
    /// Returns true if a payment has been recorded for this item.
    pub fn has_payment(&self) -> bool {
        self.paid.is_some_and(|p| !p.is_zero())
    }

    /// Returns the recorded tip, zero if none.
    pub fn tip_or_zero(&self) -> Money {
        self.tip.unwrap_or_default()
    }

    /// Returns true when the payment covers price and tip.
    pub fn is_settled(&self) -> bool {
        self.has_payment() && self.paid.unwrap_or_default() >= self.price + self.tip_or_zero()
    }

    /// Returns the overpayment to hand back, zero if there is none.
    pub fn change_money(&self) -> Money {
        match self.paid {
            Some(paid) if self.has_payment() => paid.saturating_sub(self.price + self.tip_or_zero()),
            _ => Money::zero(),
        }
    }
}
