//! Upserts generated vehicle records into a table store.

use crate::error::PopulateError;
use crate::generator::VehicleGenerator;
use std::time::{Duration, Instant};
use table_store::{RetryPolicy, StoreError, TableStore};
use tracing::{debug, info, warn};

/// Abort after this many upserts fail back to back.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// A record whose upsert failed after all retries.
#[derive(Debug)]
pub struct FailedRecord {
    pub partition_key: String,
    pub row_key: String,
    pub error: StoreError,
}

/// Metrics from a populate operation.
#[derive(Debug, Default)]
pub struct PopulateMetrics {
    /// Number of records upserted.
    pub rows_upserted: u64,
    /// Number of records that could not be written.
    pub rows_failed: u64,
    pub failures: Vec<FailedRecord>,
    /// Total time taken.
    pub total_duration: Duration,
    /// Time spent generating data.
    pub generation_duration: Duration,
    /// Time spent waiting on the store.
    pub upsert_duration: Duration,
}

impl PopulateMetrics {
    /// Calculate rows per second.
    pub fn rows_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.rows_upserted as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Generates vehicle records and upserts them one at a time.
pub struct Populator<'a, S: TableStore + ?Sized> {
    store: &'a S,
    generator: VehicleGenerator,
    retry: RetryPolicy,
    max_consecutive_failures: u32,
}

impl<'a, S: TableStore + ?Sized> Populator<'a, S> {
    pub fn new(store: &'a S, generator: VehicleGenerator) -> Self {
        Self {
            store,
            generator,
            retry: RetryPolicy::default(),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    /// Get the current generation index.
    pub fn current_index(&self) -> u64 {
        self.generator.current_index()
    }

    /// Generate and upsert `count` records.
    ///
    /// A record that still fails after retries is recorded in the metrics and
    /// generation moves on. The run is aborted once `max_consecutive_failures`
    /// records in a row have failed.
    pub async fn populate(&mut self, count: u64) -> Result<PopulateMetrics, PopulateError> {
        let start_time = Instant::now();
        let mut metrics = PopulateMetrics::default();
        let mut generation_time = Duration::ZERO;
        let mut upsert_time = Duration::ZERO;
        let mut consecutive = 0u32;

        info!(
            "Populating table '{}' with {} records (seed: {}, starting at index {})",
            self.store.table_name(),
            count,
            self.generator.seed(),
            self.generator.current_index()
        );

        for _ in 0..count {
            let gen_start = Instant::now();
            let record = self.generator.next_record();
            let entity = record.to_entity();
            generation_time += gen_start.elapsed();

            let upsert_start = Instant::now();
            let store = self.store;
            let target = &entity;
            let result = self
                .retry
                .run("upsert", move || store.upsert(target))
                .await;
            upsert_time += upsert_start.elapsed();

            match result {
                Ok(()) => {
                    consecutive = 0;
                    metrics.rows_upserted += 1;
                    debug!("Upserted {}/{}", entity.partition_key, entity.row_key);
                }
                Err(e) => {
                    consecutive += 1;
                    metrics.rows_failed += 1;
                    warn!(
                        "Failed to upsert {}/{}: {}",
                        entity.partition_key, entity.row_key, e
                    );

                    metrics.failures.push(FailedRecord {
                        partition_key: entity.partition_key,
                        row_key: entity.row_key,
                        error: e.clone(),
                    });

                    if consecutive >= self.max_consecutive_failures {
                        metrics.total_duration = start_time.elapsed();
                        metrics.generation_duration = generation_time;
                        metrics.upsert_duration = upsert_time;
                        return Err(PopulateError::TooManyFailures {
                            consecutive,
                            metrics: Box::new(metrics),
                            source: e,
                        });
                    }
                }
            }
        }

        metrics.total_duration = start_time.elapsed();
        metrics.generation_duration = generation_time;
        metrics.upsert_duration = upsert_time;

        info!(
            "Population complete: {} records upserted, {} failed in {:?} ({:.2} rows/sec)",
            metrics.rows_upserted,
            metrics.rows_failed,
            metrics.total_duration,
            metrics.rows_per_second()
        );

        Ok(metrics)
    }
}
