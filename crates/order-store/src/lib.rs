//! Persistence boundary for orders.
//!
//! Every write is a compare-and-swap on the order's [`Version`]: the caller
//! names the version it read, and the store refuses the write if anybody
//! else got there first. There is no other locking.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;
pub mod version;

pub use common::OrderId;
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use record::{OrderRecord, OrderRecordBuilder};
pub use store::{OrderStore, OrderStoreExt};
pub use version::Version;
