//! Domain error types.

use chrono::NaiveDate;
use common::{OrderId, RestaurantId};
use order_store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the order store.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// The order rejected the command.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Another order for the same restaurant and day is still collecting.
    #[error("Order {existing} already collects for restaurant {restaurant_id} on {target_date}")]
    AlreadyExists {
        existing: OrderId,
        restaurant_id: RestaurantId,
        target_date: NaiveDate,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if the write lost a race against another writer.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_version_conflict())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::OrderNotFound(_))
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(order_id) => DomainError::OrderNotFound(order_id),
            other => DomainError::Store(other),
        }
    }
}
