//! Order aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, PositionId, RestaurantId};
use order_store::Version;
use serde::{Deserialize, Serialize};

use crate::config::StateTimeouts;

use super::{
    CreateOrder, Guard, Money, NewPosition, OrderError, OrderEvent, OrderInfos, OrderPosition,
    OrderState, OrderSummary, PositionPatch, ScheduledTransition, StateManagement, Target,
    Trigger, ValidationError,
    events::{OrderCreatedData, PositionRemovedData, RemovedData, TransitionedData},
};

/// Order aggregate root.
///
/// Represents one group order from creation to archival or removal.
/// Command methods validate against the current state and return the events
/// to apply; they never mutate. [`Order::apply`] is the only mutator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,

    /// Current version for optimistic concurrency.
    version: Version,

    restaurant_id: RestaurantId,

    target_date: NaiveDate,

    state: OrderState,

    infos: OrderInfos,

    /// Line items in display order.
    positions: Vec<OrderPosition>,

    state_management: StateManagement,

    created_at: DateTime<Utc>,

    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a not-yet-stored order together with its creation event.
    pub fn create(cmd: &CreateOrder, now: DateTime<Utc>) -> (Self, OrderEvent) {
        let data = OrderCreatedData {
            order_id: cmd.order_id,
            restaurant_id: cmd.restaurant_id,
            target_date: cmd.target_date,
            created_at: now,
        };
        (Self::from_created(&data), OrderEvent::OrderCreated(data))
    }

    /// Builds a not-yet-stored order from its creation event.
    pub fn from_created(data: &OrderCreatedData) -> Self {
        Self {
            id: data.order_id,
            version: Version::initial(),
            restaurant_id: data.restaurant_id,
            target_date: data.target_date,
            state: OrderState::New,
            infos: OrderInfos::default(),
            positions: Vec::new(),
            state_management: StateManagement::default(),
            created_at: data.created_at,
            updated_at: data.created_at,
        }
    }

    /// Applies an event to the order.
    pub fn apply(&mut self, event: OrderEvent) {
        match event {
            OrderEvent::OrderCreated(data) => *self = Self::from_created(&data),
            OrderEvent::InfosUpdated(infos) => self.infos = infos,
            OrderEvent::PositionAdded(position) => self.positions.push(position),
            OrderEvent::PositionUpdated(position) => {
                if let Some(existing) = self.positions.iter_mut().find(|p| p.id == position.id) {
                    *existing = position;
                }
            }
            OrderEvent::PositionRemoved(data) => {
                self.positions.retain(|p| p.id != data.position_id);
            }
            OrderEvent::Transitioned(data) => {
                self.state = data.to;
                self.state_management.record(data.to, data.at);
            }
            // deletion happens at the store
            OrderEvent::Removed(_) => {}
        }
    }

    /// Stamps a successful mutation: new version, modification time, and
    /// the next automatic transition for the resulting state.
    pub fn touch(&mut self, version: Version, now: DateTime<Utc>, timeouts: &StateTimeouts) {
        self.version = version;
        self.updated_at = now;
        self.state_management.reschedule(self.state, now, timeouts);
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    pub fn target_date(&self) -> NaiveDate {
        self.target_date
    }

    /// Returns the current state.
    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn infos(&self) -> &OrderInfos {
        &self.infos
    }

    /// Returns all line items in display order.
    pub fn positions(&self) -> &[OrderPosition] {
        &self.positions
    }

    /// Returns a line item by ID.
    pub fn position(&self, position_id: PositionId) -> Option<&OrderPosition> {
        self.positions.iter().find(|p| p.id == position_id)
    }

    pub fn state_management(&self) -> &StateManagement {
        &self.state_management
    }

    /// Returns the scheduled automatic transition, if the state has one.
    pub fn next_transition(&self) -> Option<&ScheduledTransition> {
        self.state_management.next_transition.as_ref()
    }

    /// Returns the trigger the scheduler should fire at `now`, if any.
    pub fn due_trigger(&self, now: DateTime<Utc>) -> Option<Trigger> {
        self.next_transition()
            .filter(|t| t.is_due(now))
            .map(|t| t.trigger)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Computes the financial summary. Never cached.
    pub fn summary(&self) -> OrderSummary {
        OrderSummary::compute(&self.positions, self.infos.order_fee)
    }

    /// Returns false for archived or revoked orders closed longer than
    /// `lingering` ago.
    pub fn is_listed(&self, now: DateTime<Utc>, lingering: std::time::Duration) -> bool {
        let Some(closed_at) = self.state_management.closed_at() else {
            return true;
        };
        chrono::Duration::from_std(lingering)
            .ok()
            .and_then(|lingering| closed_at.checked_add_signed(lingering))
            .is_none_or(|hidden_from| now < hidden_from)
    }
}

// Command methods
impl Order {
    /// Replaces the order infos.
    pub fn set_infos(&self, infos: OrderInfos) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_edit_infos() {
            return Err(self.wrong_state("change order infos"));
        }

        check_amount("order fee", infos.order_fee)?;

        match infos.maximum_position_count {
            Some(0) => return Err(ValidationError::ZeroMaximumPositionCount.into()),
            Some(maximum) if (maximum as usize) < self.positions.len() => {
                return Err(ValidationError::MaximumBelowCurrent {
                    maximum,
                    current: self.positions.len(),
                }
                .into());
            }
            _ => {}
        }

        Ok(vec![OrderEvent::InfosUpdated(infos)])
    }

    /// Adds a line item. The first item moves a `New` order to `Open`.
    pub fn add_position(
        &self,
        new: NewPosition,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_edit_positions() {
            return Err(self.wrong_state("add a position"));
        }

        if let Some(maximum) = self.infos.maximum_position_count
            && self.positions.len() >= maximum as usize
        {
            return Err(ValidationError::TooManyPositions { maximum }.into());
        }

        let position = OrderPosition {
            id: PositionId::new(),
            name: new.name.trim().to_string(),
            meal: new.meal.trim().to_string(),
            price: new.price,
            paid: new.paid,
            tip: new.tip,
            index: self.next_index(),
        };
        validate_position(&position)?;

        let mut events = vec![OrderEvent::PositionAdded(position)];
        if self.state == OrderState::New {
            events.extend(self.transition(Trigger::FirstPosition, now)?);
        }

        Ok(events)
    }

    /// Changes a line item.
    ///
    /// While collecting (`New`/`Open`) anything may change. From `Locked`
    /// to `Delivered` only payment and tip may change.
    pub fn update_position(
        &self,
        position_id: PositionId,
        patch: PositionPatch,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_record_payments() {
            return Err(self.wrong_state("update a position"));
        }

        let current = self
            .position(position_id)
            .ok_or(OrderError::PositionNotFound(position_id))?;

        let mut updated = current.clone();
        if let Some(name) = patch.name {
            updated.name = name.trim().to_string();
        }
        if let Some(meal) = patch.meal {
            updated.meal = meal.trim().to_string();
        }
        if let Some(price) = patch.price {
            updated.price = price;
        }
        if let Some(paid) = patch.paid {
            updated.paid = Some(paid);
        }
        if let Some(tip) = patch.tip {
            updated.tip = Some(tip);
        }

        let order_details_changed = updated.name != current.name
            || updated.meal != current.meal
            || updated.price != current.price;
        if order_details_changed && !self.state.can_edit_positions() {
            return Err(self.wrong_state("change name, meal or price of a position"));
        }

        validate_position(&updated)?;

        Ok(vec![OrderEvent::PositionUpdated(updated)])
    }

    /// Removes a line item. Never moves the order back to `New`.
    pub fn remove_position(&self, position_id: PositionId) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_edit_positions() {
            return Err(self.wrong_state("remove a position"));
        }

        if self.position(position_id).is_none() {
            return Err(OrderError::PositionNotFound(position_id));
        }

        Ok(vec![OrderEvent::PositionRemoved(PositionRemovedData {
            position_id,
        })])
    }

    /// Takes the edge of the state graph selected by `trigger`.
    pub fn transition(
        &self,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let from = self.state;
        let target = trigger
            .target(from)
            .ok_or(OrderError::IllegalTransition { from, trigger })?;

        self.check_guards(trigger, now)?;

        let event = match target {
            Target::State(to) => OrderEvent::Transitioned(TransitionedData {
                from,
                to,
                trigger,
                at: now,
            }),
            Target::Removed => OrderEvent::Removed(RemovedData {
                from,
                trigger,
                at: now,
            }),
        };

        Ok(vec![event])
    }

    fn check_guards(&self, trigger: Trigger, now: DateTime<Utc>) -> Result<(), Guard> {
        match trigger {
            Trigger::StartOrdering => {
                self.require_roles(true)?;
                let summary = self.summary();
                if !summary.fee_is_satisfied {
                    return Err(Guard::FeeNotSatisfied {
                        remaining_fee: summary.remaining_fee,
                    });
                }
                Ok(())
            }
            Trigger::MarkOrdered => self.require_roles(false),
            Trigger::Expire => match self.next_transition() {
                Some(next) if next.trigger == trigger && next.is_due(now) => Ok(()),
                Some(next) if next.trigger == trigger => {
                    Err(Guard::DeadlineNotReached { due_at: next.at })
                }
                _ => Err(Guard::NotScheduled { trigger }),
            },
            Trigger::FirstPosition
            | Trigger::Reopen
            | Trigger::MarkDelivered
            | Trigger::Archive
            | Trigger::Revoke
            | Trigger::Delete => Ok(()),
        }
    }

    fn require_roles(&self, with_orderer: bool) -> Result<(), Guard> {
        if with_orderer && !self.infos.has_orderer() {
            return Err(Guard::OrdererMissing);
        }
        if !self.infos.has_fetcher() {
            return Err(Guard::FetcherMissing);
        }
        if !self.infos.has_money_collector() {
            return Err(Guard::MoneyCollectorMissing);
        }
        Ok(())
    }

    fn next_index(&self) -> u32 {
        self.positions
            .iter()
            .map(|p| p.index + 1)
            .max()
            .unwrap_or(0)
    }

    fn wrong_state(&self, action: &'static str) -> OrderError {
        OrderError::WrongState {
            state: self.state,
            action,
        }
    }
}

fn validate_position(position: &OrderPosition) -> Result<(), ValidationError> {
    if position.name.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if position.meal.is_empty() {
        return Err(ValidationError::MealRequired);
    }
    if !position.price.is_positive() {
        return Err(ValidationError::NonPositivePrice(position.price));
    }
    check_amount("price", position.price)?;
    for (field, amount) in [("paid", position.paid), ("tip", position.tip)] {
        if let Some(amount) = amount {
            check_amount(field, amount)?;
        }
    }
    Ok(())
}

fn check_amount(field: &'static str, amount: Money) -> Result<(), ValidationError> {
    if amount.is_negative() {
        return Err(ValidationError::NegativeAmount { field, amount });
    }
    if amount.is_out_of_range() {
        return Err(ValidationError::AmountTooLarge { field, amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    fn timeouts() -> StateTimeouts {
        StateTimeouts::uniform(Duration::from_secs(600))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
    }

    fn run(order: &mut Order, events: Vec<OrderEvent>, now: DateTime<Utc>) {
        for event in events {
            order.apply(event);
        }
        let version = order.version().next();
        order.touch(version, now, &timeouts());
    }

    fn new_order() -> Order {
        let cmd = CreateOrder::new(RestaurantId::new(), t0().date_naive());
        let (mut order, _) = Order::create(&cmd, t0());
        order.touch(Version::first(), t0(), &timeouts());
        order
    }

    fn staffed_infos(fee: i64) -> OrderInfos {
        OrderInfos {
            orderer: Some("Olga".to_string()),
            fetcher: Some("Fred".to_string()),
            money_collector: Some("Mona".to_string()),
            order_fee: Money::from_cents(fee),
            ..Default::default()
        }
    }

    fn open_order_with(positions: &[NewPosition], infos: OrderInfos) -> Order {
        let mut order = new_order();
        let events = order.set_infos(infos).unwrap();
        run(&mut order, events, t0());
        for position in positions {
            let events = order.add_position(position.clone(), t0()).unwrap();
            run(&mut order, events, t0());
        }
        order
    }

    fn pizza(name: &str) -> NewPosition {
        NewPosition::new(name, "Margherita", Money::from_cents(850))
    }

    #[test]
    fn test_new_order_starts_in_new_with_version_one() {
        let order = new_order();
        assert_eq!(order.state(), OrderState::New);
        assert_eq!(order.version(), Version::first());
        assert_eq!(order.next_transition().unwrap().trigger, Trigger::Expire);
    }

    #[test]
    fn test_first_position_opens_the_order() {
        let mut order = new_order();

        let events = order.add_position(pizza("Ann"), t0()).unwrap();
        assert_eq!(events.len(), 2);
        run(&mut order, events, t0());

        assert_eq!(order.state(), OrderState::Open);
        assert_eq!(order.positions().len(), 1);

        let events = order.add_position(pizza("Ben"), t0()).unwrap();
        assert_eq!(events.len(), 1);
        run(&mut order, events, t0());
        assert_eq!(order.positions()[1].index, 1);
    }

    #[test]
    fn test_removing_last_position_stays_open() {
        let mut order = open_order_with(&[pizza("Ann")], OrderInfos::default());
        let id = order.positions()[0].id;

        let events = order.remove_position(id).unwrap();
        run(&mut order, events, t0());

        assert!(order.positions().is_empty());
        assert_eq!(order.state(), OrderState::Open);
    }

    #[test]
    fn test_position_validation() {
        let order = new_order();

        let err = order
            .add_position(NewPosition::new(" ", "Soup", Money::from_cents(100)), t0())
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(ValidationError::NameRequired)));

        let err = order
            .add_position(NewPosition::new("Ann", "Soup", Money::zero()), t0())
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::NonPositivePrice(_))
        ));

        let err = order
            .add_position(pizza("Ann").with_tip(Money::from_cents(-1)), t0())
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::NegativeAmount { field: "tip", .. })
        ));
    }

    #[test]
    fn test_amounts_above_maximum_are_rejected() {
        let order = new_order();
        let too_much = Money::MAX_AMOUNT + Money::from_cents(1);

        let err = order
            .add_position(NewPosition::new("Ann", "Soup", too_much), t0())
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::AmountTooLarge { field: "price", .. })
        ));

        let err = order
            .add_position(pizza("Ann").with_paid(too_much), t0())
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::AmountTooLarge { field: "paid", .. })
        ));

        let infos = OrderInfos {
            order_fee: too_much,
            ..Default::default()
        };
        let err = order.set_infos(infos).unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::AmountTooLarge { field: "order fee", .. })
        ));

        assert!(
            order
                .add_position(NewPosition::new("Ann", "Soup", Money::MAX_AMOUNT), t0())
                .is_ok()
        );
    }

    #[test]
    fn test_maximum_position_count() {
        let infos = OrderInfos {
            maximum_position_count: Some(1),
            ..Default::default()
        };
        let order = open_order_with(&[pizza("Ann")], infos);

        let err = order.add_position(pizza("Ben"), t0()).unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::TooManyPositions { maximum: 1 })
        ));

        let shrink = OrderInfos {
            maximum_position_count: Some(0),
            ..Default::default()
        };
        assert!(order.set_infos(shrink).is_err());
    }

    #[test]
    fn test_lock_requires_roles() {
        let order = open_order_with(&[pizza("Ann")], OrderInfos::default());

        let err = order.transition(Trigger::StartOrdering, t0()).unwrap_err();
        assert!(matches!(err, OrderError::GuardViolation(Guard::OrdererMissing)));

        let infos = OrderInfos {
            orderer: Some("Olga".to_string()),
            fetcher: Some("Fred".to_string()),
            ..Default::default()
        };
        let order = open_order_with(&[pizza("Ann")], infos);
        let err = order.transition(Trigger::StartOrdering, t0()).unwrap_err();
        assert!(matches!(
            err,
            OrderError::GuardViolation(Guard::MoneyCollectorMissing)
        ));
    }

    #[test]
    fn test_lock_requires_fee_covered_by_tips() {
        let positions = [
            pizza("Ann").with_tip(Money::from_cents(100)),
            pizza("Ben").with_tip(Money::from_cents(50)),
        ];
        let order = open_order_with(&positions, staffed_infos(200));

        let err = order.transition(Trigger::StartOrdering, t0()).unwrap_err();
        match err {
            OrderError::GuardViolation(Guard::FeeNotSatisfied { remaining_fee }) => {
                assert_eq!(remaining_fee.cents(), 50)
            }
            other => panic!("expected fee guard, got {other:?}"),
        }

        let order = open_order_with(&positions, staffed_infos(150));
        assert!(order.transition(Trigger::StartOrdering, t0()).is_ok());
    }

    #[test]
    fn test_full_lifecycle_records_timestamps() {
        let mut order = open_order_with(&[pizza("Ann")], staffed_infos(0));

        for (i, trigger) in [
            Trigger::StartOrdering,
            Trigger::MarkOrdered,
            Trigger::MarkDelivered,
            Trigger::Archive,
        ]
        .into_iter()
        .enumerate()
        {
            let at = t0() + chrono::Duration::minutes(i as i64 + 1);
            let events = order.transition(trigger, at).unwrap();
            run(&mut order, events, at);
        }

        assert_eq!(order.state(), OrderState::Archived);
        let sm = order.state_management();
        assert_eq!(sm.locked_at, Some(t0() + chrono::Duration::minutes(1)));
        assert_eq!(sm.ordered_at, Some(t0() + chrono::Duration::minutes(2)));
        assert_eq!(sm.delivered_at, Some(t0() + chrono::Duration::minutes(3)));
        assert_eq!(sm.archived_at, Some(t0() + chrono::Duration::minutes(4)));
        assert!(order.next_transition().is_none());
    }

    #[test]
    fn test_illegal_transitions() {
        let order = new_order();

        for trigger in [Trigger::Reopen, Trigger::MarkOrdered, Trigger::Archive] {
            let err = order.transition(trigger, t0()).unwrap_err();
            assert!(matches!(
                err,
                OrderError::IllegalTransition { from: OrderState::New, .. }
            ));
        }

        let open = open_order_with(&[pizza("Ann")], OrderInfos::default());
        assert!(matches!(
            open.transition(Trigger::Delete, t0()).unwrap_err(),
            OrderError::IllegalTransition { .. }
        ));
    }

    #[test]
    fn test_reopen_clears_lock_and_reschedules_expiry() {
        let mut order = open_order_with(&[pizza("Ann")], staffed_infos(0));
        let events = order.transition(Trigger::StartOrdering, t0()).unwrap();
        run(&mut order, events, t0());
        assert_eq!(order.next_transition().unwrap().trigger, Trigger::Reopen);

        let later = t0() + chrono::Duration::minutes(10);
        let events = order.transition(Trigger::Reopen, later).unwrap();
        run(&mut order, events, later);

        assert_eq!(order.state(), OrderState::Open);
        assert!(order.state_management().locked_at.is_none());
        let next = order.next_transition().unwrap();
        assert_eq!(next.trigger, Trigger::Expire);
        assert_eq!(next.at, later + chrono::Duration::minutes(10));
    }

    #[test]
    fn test_locked_order_accepts_payments_only() {
        let mut order = open_order_with(&[pizza("Ann")], staffed_infos(0));
        let events = order.transition(Trigger::StartOrdering, t0()).unwrap();
        run(&mut order, events, t0());
        let id = order.positions()[0].id;

        assert!(matches!(
            order.add_position(pizza("Ben"), t0()).unwrap_err(),
            OrderError::WrongState { state: OrderState::Locked, .. }
        ));
        assert!(matches!(
            order.remove_position(id).unwrap_err(),
            OrderError::WrongState { .. }
        ));

        let price_change = PositionPatch {
            price: Some(Money::from_cents(1)),
            ..Default::default()
        };
        assert!(matches!(
            order.update_position(id, price_change).unwrap_err(),
            OrderError::WrongState { .. }
        ));

        // re-sending the current name is not a change
        let same_name = PositionPatch {
            name: Some("Ann".to_string()),
            paid: Some(Money::from_cents(1000)),
            ..Default::default()
        };
        let events = order.update_position(id, same_name).unwrap();
        run(&mut order, events, t0());
        assert!(order.positions()[0].is_settled());
        assert_eq!(order.summary().change_money.cents(), 150);
    }

    #[test]
    fn test_closed_orders_reject_position_changes() {
        let mut order = open_order_with(&[pizza("Ann")], OrderInfos::default());
        let events = order.transition(Trigger::Revoke, t0()).unwrap();
        run(&mut order, events, t0());
        let id = order.positions()[0].id;

        assert!(matches!(
            order.update_position(id, PositionPatch::paid(Money::from_cents(850))),
            Err(OrderError::WrongState { state: OrderState::Revoked, .. })
        ));
        assert!(order.set_infos(OrderInfos::default()).is_err());
    }

    #[test]
    fn test_expire_only_after_deadline() {
        let order = new_order();
        let due_at = order.next_transition().unwrap().at;

        let err = order
            .transition(Trigger::Expire, due_at - chrono::Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::GuardViolation(Guard::DeadlineNotReached { .. })
        ));

        let events = order.transition(Trigger::Expire, due_at).unwrap();
        assert!(matches!(events[0], OrderEvent::Removed(_)));
        assert_eq!(order.due_trigger(due_at), Some(Trigger::Expire));
    }

    #[test]
    fn test_unknown_position() {
        let order = open_order_with(&[pizza("Ann")], OrderInfos::default());
        let missing = PositionId::new();
        assert!(matches!(
            order.update_position(missing, PositionPatch::default()),
            Err(OrderError::PositionNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn test_listing_hides_long_closed_orders() {
        let mut order = open_order_with(&[pizza("Ann")], OrderInfos::default());
        let lingering = Duration::from_secs(3600);
        assert!(order.is_listed(t0() + chrono::Duration::days(30), lingering));

        let events = order.transition(Trigger::Revoke, t0()).unwrap();
        run(&mut order, events, t0());

        assert!(order.is_listed(t0() + chrono::Duration::minutes(59), lingering));
        assert!(!order.is_listed(t0() + chrono::Duration::minutes(60), lingering));
    }

    #[test]
    fn test_serialization_round_trip_keeps_schedule() {
        let order = open_order_with(&[pizza("Ann")], staffed_infos(100));
        let json = serde_json::to_value(&order).unwrap();
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
