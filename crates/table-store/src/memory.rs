//! In-process table store.
//!
//! Mirrors the service semantics the rest of the workspace depends on:
//! rows ordered by `(PartitionKey, RowKey)`, bounded pages with continuation
//! tokens, per-write ETags, and all-or-nothing batches capped at
//! [`MAX_BATCH_SIZE`]. Failures can be injected to exercise retry and
//! partial-progress paths.

use crate::batch::{DeleteBatch, MAX_BATCH_SIZE};
use crate::entity::Entity;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::store::{ContinuationToken, Segment, TableStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Largest page the service returns for one query request.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Kind of injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Fails with 503 Server Busy, which callers may retry.
    Transient,
    /// Fails with 400 Bad Request.
    Permanent,
}

impl FaultKind {
    fn status(self) -> (u16, &'static str) {
        match self {
            FaultKind::Transient => (503, "ServerBusy"),
            FaultKind::Permanent => (400, "InvalidInput"),
        }
    }
}

type RowId = (String, String);

#[derive(Default)]
struct MemoryState {
    table_exists: bool,
    rows: BTreeMap<RowId, Entity>,
    next_version: u64,
    query_faults: VecDeque<FaultKind>,
    upsert_faults: VecDeque<FaultKind>,
    batch_faults: HashMap<String, FaultKind>,
    batch_sizes: Vec<usize>,
}

impl MemoryState {
    fn require_table(&self, table: &str) -> Result<(), (u16, String)> {
        if self.table_exists {
            Ok(())
        } else {
            Err((404, format!("TableNotFound: table '{table}' does not exist")))
        }
    }

    fn next_etag(&mut self) -> String {
        self.next_version += 1;
        format!("W/\"{}\"", self.next_version)
    }
}

/// Table store kept entirely in memory.
pub struct MemoryTableStore {
    table: String,
    page_size: usize,
    max_batch_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryTableStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of entities returned per query page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Largest batch accepted by `execute_batch`.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.state().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entities in key order.
    pub fn entities(&self) -> Vec<Entity> {
        self.state().rows.values().cloned().collect()
    }

    pub fn get(&self, partition_key: &str, row_key: &str) -> Option<Entity> {
        self.state()
            .rows
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    /// Sizes of every batch that was applied, in submission order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state().batch_sizes.clone()
    }

    /// Make the next `count` query requests fail.
    pub fn fail_next_queries(&self, count: usize, kind: FaultKind) {
        self.state().query_faults.extend(std::iter::repeat(kind).take(count));
    }

    /// Make the next `count` upserts fail.
    pub fn fail_next_upserts(&self, count: usize, kind: FaultKind) {
        self.state().upsert_faults.extend(std::iter::repeat(kind).take(count));
    }

    /// Make batches for `partition_key` fail. A transient fault fails once;
    /// a permanent one fails every batch for the partition.
    pub fn fail_batches_for(&self, partition_key: impl Into<String>, kind: FaultKind) {
        self.state().batch_faults.insert(partition_key.into(), kind);
    }

    fn write_error(target: String, (status, message): (u16, String)) -> StoreError {
        StoreError::Write {
            target,
            status,
            message,
        }
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn create_table_if_not_exists(&self) -> Result<bool, StoreError> {
        let mut state = self.state();
        let created = !state.table_exists;
        state.table_exists = true;
        Ok(created)
    }

    async fn upsert(&self, entity: &Entity) -> Result<(), StoreError> {
        let target = format!("{}/{}", entity.partition_key, entity.row_key);
        let mut state = self.state();
        state
            .require_table(&self.table)
            .map_err(|e| Self::write_error(target.clone(), e))?;
        if let Some(kind) = state.upsert_faults.pop_front() {
            let (status, message) = kind.status();
            return Err(Self::write_error(target, (status, message.to_string())));
        }

        let mut stored = entity.clone();
        stored.etag = Some(state.next_etag());
        state.rows.insert(
            (entity.partition_key.clone(), entity.row_key.clone()),
            stored,
        );
        Ok(())
    }

    async fn query_segment(
        &self,
        filter: Option<&Filter>,
        token: Option<&ContinuationToken>,
    ) -> Result<Segment, StoreError> {
        let mut state = self.state();
        state
            .require_table(&self.table)
            .map_err(|(status, message)| StoreError::Query { status, message })?;
        if let Some(kind) = state.query_faults.pop_front() {
            let (status, message) = kind.status();
            return Err(StoreError::Query {
                status,
                message: message.to_string(),
            });
        }

        let start: RowId = match token {
            Some(t) => (
                t.next_partition_key.clone(),
                t.next_row_key.clone().unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        let mut matching = state
            .rows
            .range(start..)
            .map(|(_, entity)| entity)
            .filter(|entity| filter.map_or(true, |f| f.matches(entity)));

        let results: Vec<Entity> = matching.by_ref().take(self.page_size).cloned().collect();
        let continuation = matching.next().map(|next| ContinuationToken {
            next_partition_key: next.partition_key.clone(),
            next_row_key: Some(next.row_key.clone()),
        });

        Ok(Segment {
            results,
            continuation,
        })
    }

    async fn execute_batch(&self, batch: &DeleteBatch) -> Result<(), StoreError> {
        batch.ensure_within(self.max_batch_size)?;
        let target = format!("batch {} ({} rows)", batch.partition_key(), batch.len());
        let mut state = self.state();
        state
            .require_table(&self.table)
            .map_err(|e| Self::write_error(target.clone(), e))?;

        if let Some(kind) = state.batch_faults.get(batch.partition_key()).copied() {
            if kind == FaultKind::Transient {
                state.batch_faults.remove(batch.partition_key());
            }
            let (status, message) = kind.status();
            return Err(Self::write_error(target, (status, message.to_string())));
        }

        // Validate every operation before touching anything.
        let mut seen = HashSet::new();
        for row in batch.rows() {
            if !seen.insert(row.row_key.as_str()) {
                return Err(Self::write_error(
                    target,
                    (
                        400,
                        format!("InvalidDuplicateRow: row '{}' appears twice", row.row_key),
                    ),
                ));
            }
            let key = (batch.partition_key().to_string(), row.row_key.clone());
            match state.rows.get(&key) {
                None => {
                    return Err(Self::write_error(
                        target,
                        (
                            404,
                            format!("ResourceNotFound: row '{}' does not exist", row.row_key),
                        ),
                    ))
                }
                Some(existing) => {
                    if let Some(expected) = &row.etag {
                        if existing.etag.as_ref() != Some(expected) {
                            return Err(Self::write_error(
                                target,
                                (
                                    412,
                                    format!(
                                        "UpdateConditionNotSatisfied: row '{}' has changed",
                                        row.row_key
                                    ),
                                ),
                            ));
                        }
                    }
                }
            }
        }

        for row in batch.rows() {
            state
                .rows
                .remove(&(batch.partition_key().to_string(), row.row_key.clone()));
        }
        state.batch_sizes.push(batch.len());
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchRow;

    async fn store_with(keys: &[(&str, &str)]) -> MemoryTableStore {
        let store = MemoryTableStore::new("Cars");
        store.create_table_if_not_exists().await.unwrap();
        for (pk, rk) in keys {
            store.upsert(&Entity::new(*pk, *rk)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_create_table_reports_existing() {
        let store = MemoryTableStore::new("Cars");
        assert!(store.create_table_if_not_exists().await.unwrap());
        assert!(!store.create_table_if_not_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_bumps_etag() {
        let store = store_with(&[("Asia", "1")]).await;
        let first = store.get("Asia", "1").unwrap().etag;

        let replacement = Entity::new("Asia", "1").with_property("City", "Seoul");
        store.upsert(&replacement).await.unwrap();

        let stored = store.get("Asia", "1").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(stored.get("City").and_then(|v| v.as_str()), Some("Seoul"));
        assert_ne!(stored.etag, first);
    }

    #[tokio::test]
    async fn test_upsert_before_create_fails() {
        let store = MemoryTableStore::new("Cars");
        let err = store.upsert(&Entity::new("Asia", "1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_query_orders_by_partition_then_row() {
        let store = store_with(&[("Europe", "2"), ("Asia", "9"), ("Asia", "10")]).await;
        let segment = store.query_segment(None, None).await.unwrap();
        let keys: Vec<_> = segment
            .results
            .iter()
            .map(|e| format!("{}/{}", e.partition_key, e.row_key))
            .collect();
        assert_eq!(keys, vec!["Asia/10", "Asia/9", "Europe/2"]);
        assert!(segment.is_last());
    }

    #[tokio::test]
    async fn test_query_continuation_token_points_at_next_row() {
        let store = store_with(&[("Asia", "1"), ("Asia", "2"), ("Europe", "3")]).await;
        let store = store.with_page_size(2);

        let first = store.query_segment(None, None).await.unwrap();
        let token = first.continuation.clone().unwrap();
        assert_eq!(token.next_partition_key, "Europe");
        assert_eq!(token.next_row_key.as_deref(), Some("3"));

        let second = store.query_segment(None, Some(&token)).await.unwrap();
        assert_eq!(second.results.len(), 1);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_batch_deletes_atomically() {
        let store = store_with(&[("Asia", "1"), ("Asia", "2"), ("Asia", "3")]).await;

        let missing = DeleteBatch::new(
            "Asia",
            vec![BatchRow::new("1", None), BatchRow::new("404", None)],
            MAX_BATCH_SIZE,
        )
        .unwrap();
        let err = store.execute_batch(&missing).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { status: 404, .. }));
        assert_eq!(store.len(), 3);

        let ok = DeleteBatch::new(
            "Asia",
            vec![BatchRow::new("1", None), BatchRow::new("2", None)],
            MAX_BATCH_SIZE,
        )
        .unwrap();
        store.execute_batch(&ok).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.batch_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn test_batch_etag_mismatch_rejected() {
        let store = store_with(&[("Asia", "1")]).await;
        let batch = DeleteBatch::new(
            "Asia",
            vec![BatchRow::new("1", Some("W/\"stale\"".to_string()))],
            MAX_BATCH_SIZE,
        )
        .unwrap();

        let err = store.execute_batch(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { status: 412, .. }));
        assert_eq!(store.len(), 1);

        let current = store.get("Asia", "1").unwrap().etag;
        let batch = DeleteBatch::new("Asia", vec![BatchRow::new("1", current)], MAX_BATCH_SIZE)
            .unwrap();
        store.execute_batch(&batch).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_batch_over_store_limit_rejected() {
        let store = store_with(&[("Asia", "1"), ("Asia", "2"), ("Asia", "3")])
            .await
            .with_max_batch_size(2);
        let batch = DeleteBatch::new(
            "Asia",
            vec![
                BatchRow::new("1", None),
                BatchRow::new("2", None),
                BatchRow::new("3", None),
            ],
            MAX_BATCH_SIZE,
        )
        .unwrap();

        let err = store.execute_batch(&batch).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::BatchSizeExceeded {
                size: 3,
                limit: 2,
                ..
            }
        ));
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_batch_duplicate_rows_rejected() {
        let store = store_with(&[("Asia", "1")]).await;
        let batch = DeleteBatch::new(
            "Asia",
            vec![BatchRow::new("1", None), BatchRow::new("1", None)],
            MAX_BATCH_SIZE,
        )
        .unwrap();
        let err = store.execute_batch(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_injected_batch_faults() {
        let store = store_with(&[("Asia", "1"), ("Europe", "2")]).await;
        store.fail_batches_for("Asia", FaultKind::Transient);
        store.fail_batches_for("Europe", FaultKind::Permanent);

        let asia = DeleteBatch::new("Asia", vec![BatchRow::new("1", None)], MAX_BATCH_SIZE).unwrap();
        let europe =
            DeleteBatch::new("Europe", vec![BatchRow::new("2", None)], MAX_BATCH_SIZE).unwrap();

        assert!(store.execute_batch(&asia).await.unwrap_err().is_transient());
        store.execute_batch(&asia).await.unwrap();

        for _ in 0..2 {
            let err = store.execute_batch(&europe).await.unwrap_err();
            assert!(!err.is_transient());
        }
        assert_eq!(store.len(), 1);
    }
}
