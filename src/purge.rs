//! Bulk delete of every record in the table.
//!
//! The sweep is a pipeline of small stages:
//!
//! ```text
//! SegmentPager ──► group_by_partition ──► chunk_group ──► execute_batch (retried)
//! ```
//!
//! Batches are atomic and scoped to one partition, so each page is split by
//! partition key first and every group is then cut to the store's batch cap.

use std::collections::BTreeMap;
use std::io;
use table_store::{
    BatchRow, DeleteBatch, Entity, Filter, RetryPolicy, SegmentPager, StoreError, TableStore,
    PARTITION_KEY, ROW_KEY,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Rows of one page that share a partition key, in the order they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionGroup {
    pub partition_key: String,
    pub rows: Vec<BatchRow>,
}

/// Progress of a delete sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Pages whose batches were all applied.
    pub pages: u64,
    pub batches: u64,
    pub rows_deleted: u64,
    pub rows_per_partition: BTreeMap<String, u64>,
}

impl PurgeReport {
    fn record_batch(&mut self, batch: &DeleteBatch) {
        self.batches += 1;
        self.rows_deleted += batch.len() as u64;
        *self
            .rows_per_partition
            .entry(batch.partition_key().to_string())
            .or_default() += batch.len() as u64;
    }
}

#[derive(Error, Debug)]
pub enum PurgeError {
    /// Reading the next page failed.
    #[error("Delete aborted while reading page {page}: {source}")]
    Scan {
        page: u64,
        #[source]
        source: StoreError,
        progress: Box<PurgeReport>,
    },

    /// A batch could not be applied. Rows already deleted stay deleted.
    #[error("Delete aborted on page {page}, partition '{partition_key}': {source}")]
    Aborted {
        page: u64,
        partition_key: String,
        #[source]
        source: StoreError,
        progress: Box<PurgeReport>,
    },

    /// The progress callback failed to report a page.
    #[error("Failed to report delete progress: {source}")]
    Output {
        #[source]
        source: io::Error,
        progress: Box<PurgeReport>,
    },
}

impl PurgeError {
    /// What had been deleted before the failure.
    pub fn progress(&self) -> &PurgeReport {
        match self {
            PurgeError::Scan { progress, .. }
            | PurgeError::Aborted { progress, .. }
            | PurgeError::Output { progress, .. } => progress,
        }
    }
}

/// Split a page by partition key, keeping first-seen order.
pub fn group_by_partition(entities: Vec<Entity>) -> Vec<PartitionGroup> {
    let mut groups: Vec<PartitionGroup> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for entity in entities {
        let row = BatchRow::new(entity.row_key, entity.etag);
        match index.get(&entity.partition_key) {
            Some(&i) => groups[i].rows.push(row),
            None => {
                index.insert(entity.partition_key.clone(), groups.len());
                groups.push(PartitionGroup {
                    partition_key: entity.partition_key,
                    rows: vec![row],
                });
            }
        }
    }
    groups
}

/// Cut one partition group into batches of at most `limit` rows.
pub fn chunk_group(group: PartitionGroup, limit: usize) -> Result<Vec<DeleteBatch>, StoreError> {
    let limit = limit.max(1);
    let PartitionGroup {
        partition_key,
        rows,
    } = group;

    let mut batches = Vec::with_capacity(rows.len().div_ceil(limit));
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        let chunk: Vec<BatchRow> = rows.by_ref().take(limit).collect();
        batches.push(DeleteBatch::new(partition_key.clone(), chunk, limit)?);
    }
    Ok(batches)
}

/// Delete every entity in the table, page by page.
pub async fn delete_all<S>(store: &S, retry: RetryPolicy) -> Result<PurgeReport, PurgeError>
where
    S: TableStore + ?Sized,
{
    delete_all_with_progress(store, retry, |_, _| Ok(())).await
}

/// Like [`delete_all`], calling `on_page` with the page number and the
/// running totals after every page is applied.
pub async fn delete_all_with_progress<S, F>(
    store: &S,
    retry: RetryPolicy,
    mut on_page: F,
) -> Result<PurgeReport, PurgeError>
where
    S: TableStore + ?Sized,
    F: FnMut(u64, &PurgeReport) -> io::Result<()>,
{
    let limit = store.max_batch_size();
    let mut pager = SegmentPager::new(store, None).with_retry(retry);
    let mut report = PurgeReport::default();

    info!(
        "Deleting all records from '{}' (batch limit {})",
        store.table_name(),
        limit
    );

    loop {
        let page = report.pages + 1;
        let segment = match pager.next_segment().await {
            Ok(Some(segment)) => segment,
            Ok(None) => break,
            Err(source) => {
                error!("Delete aborted while reading page {page}: {source}");
                return Err(PurgeError::Scan {
                    page,
                    source,
                    progress: Box::new(report),
                });
            }
        };

        debug!("Page {}: {} entities", page, segment.results.len());

        for group in group_by_partition(segment.results) {
            let partition_key = group.partition_key.clone();
            let batches = chunk_group(group, limit).map_err(|source| PurgeError::Aborted {
                page,
                partition_key: partition_key.clone(),
                source,
                progress: Box::new(report.clone()),
            })?;

            for batch in batches {
                if let Err(source) = submit_batch(store, &batch, retry).await {
                    error!(
                        "Delete aborted on page {page}, partition '{partition_key}': {source}"
                    );
                    return Err(PurgeError::Aborted {
                        page,
                        partition_key,
                        source,
                        progress: Box::new(report),
                    });
                }
                debug!(
                    "Deleted {} rows from partition '{}'",
                    batch.len(),
                    partition_key
                );
                report.record_batch(&batch);
            }
        }

        report.pages += 1;
        if let Err(source) = on_page(page, &report) {
            return Err(PurgeError::Output {
                source,
                progress: Box::new(report),
            });
        }
    }

    info!(
        "Deleted {} records in {} batches over {} pages",
        report.rows_deleted, report.batches, report.pages
    );
    Ok(report)
}

/// Submit one batch with retry.
///
/// A retried batch may already have been applied by an attempt whose response
/// was lost; the service then answers 404. In that case the rows are looked up
/// and the batch counts as applied if none of them is left.
async fn submit_batch<S>(
    store: &S,
    batch: &DeleteBatch,
    retry: RetryPolicy,
) -> Result<(), StoreError>
where
    S: TableStore + ?Sized,
{
    let mut attempts = 0u32;
    let counter = &mut attempts;
    let result = retry
        .run("batch delete", move || {
            *counter += 1;
            store.execute_batch(batch)
        })
        .await;

    match result {
        Err(source) if attempts > 1 && source.status() == Some(404) => {
            match rows_remaining(store, batch, retry).await {
                Ok(0) => {
                    warn!(
                        "Batch for partition '{}' ({} rows) was applied by an earlier attempt",
                        batch.partition_key(),
                        batch.len()
                    );
                    Ok(())
                }
                Ok(remaining) => {
                    debug!(
                        "{remaining} of {} rows still present in partition '{}'",
                        batch.len(),
                        batch.partition_key()
                    );
                    Err(source)
                }
                Err(e) => {
                    warn!("Could not check batch rows after 404: {e}");
                    Err(source)
                }
            }
        }
        other => other,
    }
}

/// Count how many rows of `batch` still exist, one keyed query per row.
async fn rows_remaining<S>(
    store: &S,
    batch: &DeleteBatch,
    retry: RetryPolicy,
) -> Result<usize, StoreError>
where
    S: TableStore + ?Sized,
{
    let mut remaining = 0;
    for row in batch.rows() {
        let filter = Filter::new()
            .eq(PARTITION_KEY, batch.partition_key())
            .eq(ROW_KEY, row.row_key.as_str());
        let mut pager = SegmentPager::new(store, Some(filter)).with_retry(retry);
        while let Some(segment) = pager.next_segment().await? {
            remaining += segment.results.len();
        }
    }
    Ok(remaining)
}
