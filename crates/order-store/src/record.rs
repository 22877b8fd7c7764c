use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, StoreError, Version};

/// One persisted order.
///
/// The store does not interpret `document`; it only reads the handful of
/// columns it needs to index on (state, due timestamp, creation time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// The order this record belongs to.
    pub order_id: OrderId,

    /// The version this record will have once stored.
    pub version: Version,

    /// Lifecycle state name, kept as a column for filtering.
    pub state: String,

    /// When the order's next automatic transition falls due, if it has one.
    pub next_transition_at: Option<DateTime<Utc>>,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order was last mutated.
    pub updated_at: DateTime<Utc>,

    /// The full order as JSON.
    pub document: serde_json::Value,
}

impl OrderRecord {
    /// Creates a new record builder.
    pub fn builder() -> OrderRecordBuilder {
        OrderRecordBuilder::default()
    }

    /// Returns true if the record's automatic transition is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_transition_at.is_some_and(|at| at <= now)
    }
}

/// Builder for [`OrderRecord`].
#[derive(Debug, Default)]
pub struct OrderRecordBuilder {
    order_id: Option<OrderId>,
    version: Option<Version>,
    state: Option<String>,
    next_transition_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    document: Option<serde_json::Value>,
}

impl OrderRecordBuilder {
    pub fn order_id(mut self, id: OrderId) -> Self {
        self.order_id = Some(id);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn next_transition_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.next_transition_at = at;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Sets the modification time. Defaults to the creation time.
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Sets the document from a serializable value.
    pub fn document<T: Serialize>(mut self, document: &T) -> Result<Self, serde_json::Error> {
        self.document = Some(serde_json::to_value(document)?);
        Ok(self)
    }

    /// Sets the document from a raw JSON value.
    pub fn document_raw(mut self, document: serde_json::Value) -> Self {
        self.document = Some(document);
        self
    }

    /// Builds the record, failing if a required field is missing.
    pub fn build(self) -> Result<OrderRecord, StoreError> {
        fn missing(field: &str) -> StoreError {
            StoreError::InvalidRecord(format!("{field} is required"))
        }

        let created_at = self.created_at.ok_or_else(|| missing("created_at"))?;
        Ok(OrderRecord {
            order_id: self.order_id.ok_or_else(|| missing("order_id"))?,
            version: self.version.ok_or_else(|| missing("version"))?,
            state: self.state.ok_or_else(|| missing("state"))?,
            next_transition_at: self.next_transition_at,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            document: self.document.ok_or_else(|| missing("document"))?,
        })
    }
}
