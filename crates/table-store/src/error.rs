//! Error types for table store operations.

use thiserror::Error;

/// Errors that can occur while talking to a table store.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The store could not be reached (DNS, TLS, connection reset, timeout).
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A write (upsert or batch delete) was rejected by the store.
    #[error("Write to {target} failed with status {status}: {message}")]
    Write {
        target: String,
        status: u16,
        message: String,
    },

    /// A query page request was rejected by the store.
    #[error("Query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    /// Creating or resolving the table failed.
    #[error("Table '{table}' setup failed with status {status}: {message}")]
    TableSetup {
        table: String,
        status: u16,
        message: String,
    },

    /// A batch holds more operations than the store accepts in one request.
    #[error(
        "Batch for partition '{partition_key}' has {size} operations, exceeding the limit of {limit}"
    )]
    BatchSizeExceeded {
        partition_key: String,
        size: usize,
        limit: usize,
    },

    /// A batch with no operations was built.
    #[error("Batch for partition '{0}' has no operations")]
    EmptyBatch(String),

    /// The connection string is missing required keys or has bad values.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The store answered with something that could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Connectivity(_) => true,
            StoreError::Write { status, .. }
            | StoreError::Query { status, .. }
            | StoreError::TableSetup { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Write { status, .. }
            | StoreError::Query { status, .. }
            | StoreError::TableSetup { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Connectivity(e.to_string())
    }
}
