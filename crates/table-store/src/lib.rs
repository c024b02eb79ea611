//! Table storage client for carlot.
//!
//! This crate is the boundary to the key/value table service the demo runs
//! against. Everything above it (record model, generator, queries, bulk
//! delete) talks to a [`TableStore`], which has two implementations:
//!
//! - [`AzureTableStore`] - Azure Table storage (or Azurite) over its REST API
//! - [`MemoryTableStore`] - an in-process table with the same paging,
//!   batching and atomicity rules, used by tests and `--store memory`
//!
//! # Architecture
//!
//! ```text
//!  Filter ──► TableStore::query_segment ──► Segment { results, continuation }
//!                      ▲                              │
//!                      └──────── SegmentPager ◄───────┘
//!
//!  DeleteBatch (one partition, <= max_batch_size) ──► TableStore::execute_batch
//! ```
//!
//! Requests that fail transiently are retried by [`RetryPolicy`].

pub mod azure;
pub mod batch;
pub mod entity;
pub mod error;
pub mod filter;
pub mod memory;
pub mod pager;
pub mod retry;
pub mod store;

pub use azure::{AzureTableStore, ConnectionString};
pub use batch::{BatchRow, DeleteBatch, MAX_BATCH_SIZE};
pub use entity::{EdmValue, Entity, PARTITION_KEY, ROW_KEY};
pub use error::StoreError;
pub use filter::{Filter, Predicate};
pub use memory::{FaultKind, MemoryTableStore};
pub use pager::SegmentPager;
pub use retry::RetryPolicy;
pub use store::{ContinuationToken, Segment, TableStore};
