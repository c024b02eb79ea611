//! Atomic per-partition delete batches.

use crate::error::StoreError;

/// Largest number of operations the table service accepts in one batch.
pub const MAX_BATCH_SIZE: usize = 100;

/// One row to delete. A present ETag makes the delete conditional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    pub row_key: String,
    pub etag: Option<String>,
}

impl BatchRow {
    pub fn new(row_key: impl Into<String>, etag: Option<String>) -> Self {
        Self {
            row_key: row_key.into(),
            etag,
        }
    }

    /// ETag sent in `If-Match`; `*` deletes regardless of version.
    pub fn if_match(&self) -> &str {
        self.etag.as_deref().unwrap_or("*")
    }
}

/// Delete operations scoped to a single partition, submitted as one
/// all-or-nothing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBatch {
    partition_key: String,
    rows: Vec<BatchRow>,
}

impl DeleteBatch {
    /// Build a batch, refusing empty batches and batches larger than `limit`.
    pub fn new(
        partition_key: impl Into<String>,
        rows: Vec<BatchRow>,
        limit: usize,
    ) -> Result<Self, StoreError> {
        let partition_key = partition_key.into();
        if rows.is_empty() {
            return Err(StoreError::EmptyBatch(partition_key));
        }
        if rows.len() > limit {
            return Err(StoreError::BatchSizeExceeded {
                partition_key,
                size: rows.len(),
                limit,
            });
        }
        Ok(Self {
            partition_key,
            rows,
        })
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn rows(&self) -> &[BatchRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Re-check the size against a store's limit before submission.
    pub fn ensure_within(&self, limit: usize) -> Result<(), StoreError> {
        if self.rows.len() > limit {
            return Err(StoreError::BatchSizeExceeded {
                partition_key: self.partition_key.clone(),
                size: self.rows.len(),
                limit,
            });
        }
        Ok(())
    }
}
