use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    OrderId, OrderRecord, Result, Version,
    store::{OrderStore, conflict_or_missing, validate_record_for_save},
};

/// In-memory order store for tests and single-process deployments.
///
/// The compare-and-swap happens under the write lock, so it gives the same
/// guarantees as the PostgreSQL implementation within one process.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, OrderRecord>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Removes all orders.
    pub async fn clear(&self) {
        self.orders.write().await.clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn save_if_version_matches(
        &self,
        record: OrderRecord,
        expected: Version,
    ) -> Result<Version> {
        validate_record_for_save(&record, expected)?;

        let order_id = record.order_id;
        let mut orders = self.orders.write().await;

        let actual = orders.get(&order_id).map(|r| r.version);
        if actual.unwrap_or(Version::initial()) != expected {
            return Err(conflict_or_missing(order_id, expected, actual));
        }

        let version = record.version;
        orders.insert(order_id, record);

        Ok(version)
    }

    async fn delete_if_version_matches(&self, order_id: OrderId, expected: Version) -> Result<()> {
        let mut orders = self.orders.write().await;

        let actual = orders.get(&order_id).map(|r| r.version);
        if actual != Some(expected) {
            return Err(conflict_or_missing(order_id, expected, actual));
        }

        orders.remove(&order_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<OrderRecord>> {
        let orders = self.orders.read().await;
        let mut records: Vec<_> = orders.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<OrderRecord>> {
        let orders = self.orders.read().await;
        let mut records: Vec<_> = orders.values().filter(|r| r.is_due(now)).cloned().collect();
        records.sort_by_key(|r| r.next_transition_at);
        Ok(records)
    }
}
