//! Continuation-token iteration over query results.

use crate::error::StoreError;
use crate::filter::Filter;
use crate::retry::RetryPolicy;
use crate::store::{ContinuationToken, Segment, TableStore};
use tokio_util::sync::CancellationToken;

/// Walks a query page by page until the store stops returning a
/// continuation token or the cancellation token fires.
pub struct SegmentPager<'a, S: ?Sized> {
    store: &'a S,
    filter: Option<Filter>,
    token: Option<ContinuationToken>,
    retry: RetryPolicy,
    cancellation: CancellationToken,
    pages_fetched: u64,
    finished: bool,
}

impl<'a, S: TableStore + ?Sized> SegmentPager<'a, S> {
    /// Page through entities matching `filter` (all entities when `None`).
    pub fn new(store: &'a S, filter: Option<Filter>) -> Self {
        Self {
            store,
            filter,
            token: None,
            retry: RetryPolicy::none(),
            cancellation: CancellationToken::new(),
            pages_fetched: 0,
            finished: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// True once the last page was returned or the pager was cancelled.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page, or `None` when iteration is over.
    pub async fn next_segment(&mut self) -> Result<Option<Segment>, StoreError> {
        if self.finished {
            return Ok(None);
        }
        if self.cancellation.is_cancelled() {
            tracing::info!(
                "Paging over '{}' cancelled after {} pages",
                self.store.table_name(),
                self.pages_fetched
            );
            self.finished = true;
            return Ok(None);
        }

        let store = self.store;
        let filter = self.filter.as_ref();
        let token = self.token.as_ref();
        let segment = self
            .retry
            .run("query segment", move || store.query_segment(filter, token))
            .await?;

        self.pages_fetched += 1;
        self.token = segment.continuation.clone();
        self.finished = self.token.is_none();

        tracing::debug!(
            "Fetched page {} of '{}' ({} entities, last: {})",
            self.pages_fetched,
            self.store.table_name(),
            segment.results.len(),
            self.finished
        );

        Ok(Some(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::memory::{FaultKind, MemoryTableStore};
    use std::time::Duration;

    async fn seeded_store(rows: usize, page_size: usize) -> MemoryTableStore {
        let store = MemoryTableStore::new("Cars").with_page_size(page_size);
        store.create_table_if_not_exists().await.unwrap();
        for i in 0..rows {
            let region = if i % 2 == 0 { "Asia" } else { "Europe" };
            let entity = Entity::new(region, format!("{i:03}")).with_property("Index", i as i32);
            store.upsert(&entity).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_pages_until_token_exhausted() {
        let store = seeded_store(10, 3).await;
        let mut pager = SegmentPager::new(&store, None);

        let mut sizes = Vec::new();
        while let Some(segment) = pager.next_segment().await.unwrap() {
            sizes.push(segment.results.len());
        }

        assert_eq!(sizes, vec![3, 3, 3, 1]);
        assert_eq!(pager.pages_fetched(), 4);
        assert!(pager.is_finished());
        assert!(pager.next_segment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filtered_paging() {
        let store = seeded_store(10, 2).await;
        let filter = Filter::new().eq("PartitionKey", "Europe");
        let mut pager = SegmentPager::new(&store, Some(filter));

        let mut keys = Vec::new();
        while let Some(segment) = pager.next_segment().await.unwrap() {
            keys.extend(segment.results.into_iter().map(|e| e.row_key));
        }

        assert_eq!(keys, vec!["001", "003", "005", "007", "009"]);
    }

    #[tokio::test]
    async fn test_empty_table_single_page() {
        let store = seeded_store(0, 3).await;
        let mut pager = SegmentPager::new(&store, None);

        let segment = pager.next_segment().await.unwrap().unwrap();
        assert!(segment.results.is_empty());
        assert!(segment.is_last());
        assert!(pager.next_segment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancellation_stops_paging() {
        let store = seeded_store(10, 3).await;
        let cancellation = CancellationToken::new();
        let mut pager = SegmentPager::new(&store, None).with_cancellation(cancellation.clone());

        assert!(pager.next_segment().await.unwrap().is_some());
        cancellation.cancel();
        assert!(pager.next_segment().await.unwrap().is_none());
        assert_eq!(pager.pages_fetched(), 1);
        assert!(pager.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_query_failure_retried() {
        let store = seeded_store(4, 10).await;
        store.fail_next_queries(2, FaultKind::Transient);
        let mut pager = SegmentPager::new(&store, None)
            .with_retry(RetryPolicy::with_retries(3, Duration::from_millis(10)));

        let segment = pager.next_segment().await.unwrap().unwrap();
        assert_eq!(segment.results.len(), 4);
    }

    #[tokio::test]
    async fn test_query_before_table_creation_fails() {
        let store = MemoryTableStore::new("Cars");
        let mut pager = SegmentPager::new(&store, None);

        let err = pager.next_segment().await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
