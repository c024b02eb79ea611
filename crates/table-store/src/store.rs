//! Table store trait and paging types.
//!
//! The trait abstracts the storage backend so the same generator, query and
//! delete logic runs against:
//! - Azure Table storage or Azurite (`AzureTableStore`)
//! - an in-process table (`MemoryTableStore`)

use crate::batch::{DeleteBatch, MAX_BATCH_SIZE};
use crate::entity::Entity;
use crate::error::StoreError;
use crate::filter::Filter;
use async_trait::async_trait;

/// Cursor to the next page of a query. The service hands back the key of the
/// first entity it did not return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub results: Vec<Entity>,
    /// `None` once the last page has been returned.
    pub continuation: Option<ContinuationToken>,
}

impl Segment {
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

/// Operations on a single table.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Name of the table this handle is bound to.
    fn table_name(&self) -> &str;

    /// Create the table. Returns `false` if it already existed.
    async fn create_table_if_not_exists(&self) -> Result<bool, StoreError>;

    /// Insert the entity, replacing any existing entity with the same key.
    async fn upsert(&self, entity: &Entity) -> Result<(), StoreError>;

    /// Fetch one page of entities matching `filter`, starting at `token`.
    async fn query_segment(
        &self,
        filter: Option<&Filter>,
        token: Option<&ContinuationToken>,
    ) -> Result<Segment, StoreError>;

    /// Delete every row of the batch atomically.
    async fn execute_batch(&self, batch: &DeleteBatch) -> Result<(), StoreError>;

    /// Largest batch this store accepts.
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }
}
