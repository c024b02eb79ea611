//! Error types for the vehicle populator.

use crate::populator::PopulateMetrics;
use table_store::StoreError;
use thiserror::Error;

/// Errors that can occur while populating the table.
#[derive(Error, Debug)]
pub enum PopulateError {
    /// Too many upserts failed in a row; the store is most likely unreachable.
    #[error("Aborted after {consecutive} consecutive upsert failures: {source}")]
    TooManyFailures {
        consecutive: u32,
        /// Progress made before the abort.
        metrics: Box<PopulateMetrics>,
        #[source]
        source: StoreError,
    },
}
