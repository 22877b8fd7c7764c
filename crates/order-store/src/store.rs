use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{OrderId, OrderRecord, Result, StoreError, Version};

/// Core trait for order persistence.
///
/// All writes are conditional on the caller's expected version and are
/// atomic: either the whole record is replaced or nothing changes.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads the current record of an order, if it exists.
    async fn load(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Stores `record` if the stored version equals `expected`.
    ///
    /// `expected == Version::initial()` means the order must not exist yet.
    /// `record.version` must be `expected.next()`. On mismatch the store is
    /// left untouched and `VersionConflict` is returned.
    ///
    /// Returns the version now stored.
    async fn save_if_version_matches(&self, record: OrderRecord, expected: Version)
    -> Result<Version>;

    /// Removes an order if the stored version equals `expected`.
    async fn delete_if_version_matches(&self, order_id: OrderId, expected: Version) -> Result<()>;

    /// Lists every stored order, newest first.
    async fn list(&self) -> Result<Vec<OrderRecord>>;

    /// Lists orders whose next automatic transition is due at `now`,
    /// earliest deadline first.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<OrderRecord>>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Stores a brand-new order.
    async fn insert(&self, record: OrderRecord) -> Result<Version> {
        self.save_if_version_matches(record, Version::initial())
            .await
    }

    /// Loads an order, failing with `NotFound` if it does not exist.
    async fn load_existing(&self, order_id: OrderId) -> Result<OrderRecord> {
        self.load(order_id)
            .await?
            .ok_or(StoreError::NotFound(order_id))
    }

    /// Checks if an order exists.
    async fn exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.load(order_id).await?.is_some())
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// Validates a record before a conditional save.
pub fn validate_record_for_save(record: &OrderRecord, expected: Version) -> Result<()> {
    if record.version != expected.next() {
        return Err(StoreError::InvalidRecord(format!(
            "record version must follow the expected version. Expected {}, got {}",
            expected.next(),
            record.version
        )));
    }

    if record.state.is_empty() {
        return Err(StoreError::InvalidRecord(
            "record state must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Decides the error for a conditional write that found `actual` in storage.
pub(crate) fn conflict_or_missing(
    order_id: OrderId,
    expected: Version,
    actual: Option<Version>,
) -> StoreError {
    match actual {
        None => StoreError::NotFound(order_id),
        Some(actual) => StoreError::VersionConflict {
            order_id,
            expected,
            actual,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: Version) -> OrderRecord {
        OrderRecord::builder()
            .order_id(OrderId::new())
            .version(version)
            .state("Open")
            .created_at(Utc::now())
            .document_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn validate_accepts_next_version() {
        assert!(validate_record_for_save(&record(Version::first()), Version::initial()).is_ok());
        assert!(validate_record_for_save(&record(Version::new(4)), Version::new(3)).is_ok());
    }

    #[test]
    fn validate_rejects_skipped_versions() {
        let err = validate_record_for_save(&record(Version::new(5)), Version::new(3)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[test]
    fn missing_row_is_not_found_and_other_rows_conflict() {
        let id = OrderId::new();
        assert!(matches!(
            conflict_or_missing(id, Version::new(2), None),
            StoreError::NotFound(found) if found == id
        ));
        assert!(
            conflict_or_missing(id, Version::new(2), Some(Version::new(3))).is_version_conflict()
        );
    }
}
