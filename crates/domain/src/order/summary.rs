//! Financial reconciliation of an order's line items.
//!
//! Everything here is derived on read and never stored. The order fee is
//! paid out of the collected tips first; only tips beyond the fee count as
//! tips kept by the fetcher.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Money, OrderPosition};

/// Totals derived from an order's positions and fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Distinct participant names.
    pub participants: usize,

    /// Number of line items.
    pub count: usize,

    /// Line items without a recorded payment.
    pub count_missing: usize,

    /// Sum of all item prices plus the order fee.
    pub price: Money,

    /// Sum of recorded payments.
    pub paid: Money,

    /// Raw sum of recorded tips, before the fee is taken out.
    pub tip_sum: Money,

    /// Part of the fee not yet covered by tips.
    pub remaining_fee: Money,

    /// Tips left over once the fee is covered.
    pub remaining_tip: Money,

    /// Prices of unpaid items plus the remaining fee.
    pub paid_missing: Money,

    /// Overpayments to hand back to participants.
    pub change_money: Money,

    pub fee_is_satisfied: bool,
}

impl OrderSummary {
    /// Computes the summary for a set of positions and an order fee.
    pub fn compute(positions: &[OrderPosition], order_fee: Money) -> Self {
        let participants = positions
            .iter()
            .map(|p| p.name.as_str())
            .collect::<HashSet<_>>()
            .len();

        let unpaid = positions.iter().filter(|p| !p.has_payment());

        let tip_sum: Money = positions.iter().map(OrderPosition::tip_or_zero).sum();
        let remaining_fee = order_fee.saturating_sub(tip_sum);
        let remaining_tip = tip_sum.saturating_sub(order_fee);

        let items_price: Money = positions.iter().map(|p| p.price).sum();
        let unpaid_price: Money = unpaid.clone().map(|p| p.price).sum();

        Self {
            participants,
            count: positions.len(),
            count_missing: unpaid.count(),
            price: items_price + order_fee,
            paid: positions.iter().filter_map(|p| p.paid).sum(),
            tip_sum,
            remaining_fee,
            remaining_tip,
            paid_missing: unpaid_price + remaining_fee,
            change_money: positions.iter().map(OrderPosition::change_money).sum(),
            fee_is_satisfied: remaining_fee.is_zero(),
        }
    }
}
