//! The three fixed vehicle queries.
//!
//! Each query is a conjunction of equality predicates evaluated by the store;
//! results are streamed page by page and never filtered again client-side.

use std::fmt;
use std::io::{self, Write};
use table_store::{Filter, RetryPolicy, SegmentPager, StoreError, TableStore, PARTITION_KEY};
use thiserror::Error;
use tracing::{debug, info, warn};
use vehicle_model::{fields, Region, VehicleRecord};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Query failed: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to write query output: {0}")]
    Output(#[from] io::Error),
}

/// Menu queries `Z1`, `Z2` and `Z3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleQuery {
    /// Five-seat hatchbacks in Africa.
    FiveSeatHatchbacksInAfrica,
    /// Electric vehicles in Asia.
    ElectricInAsia,
    /// Sedans in any region.
    Sedans,
}

impl VehicleQuery {
    pub const ALL: [VehicleQuery; 3] = [
        VehicleQuery::FiveSeatHatchbacksInAfrica,
        VehicleQuery::ElectricInAsia,
        VehicleQuery::Sedans,
    ];

    pub fn filter(&self) -> Filter {
        match self {
            VehicleQuery::FiveSeatHatchbacksInAfrica => Filter::new()
                .eq(fields::SEATS_COUNT, 5)
                .eq(fields::BODY_TYPE, "Hatchback")
                .eq(PARTITION_KEY, Region::Africa.as_str()),
            VehicleQuery::ElectricInAsia => Filter::new()
                .eq(PARTITION_KEY, Region::Asia.as_str())
                .eq(fields::ENGINE_TYPE, "Electric"),
            VehicleQuery::Sedans => Filter::new().eq(fields::BODY_TYPE, "Sedan"),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            VehicleQuery::FiveSeatHatchbacksInAfrica => "5-seat hatchbacks in Africa",
            VehicleQuery::ElectricInAsia => "electric vehicles in Asia",
            VehicleQuery::Sedans => "sedans",
        }
    }
}

impl fmt::Display for VehicleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Outcome of one query run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryReport {
    /// Pages fetched from the store.
    pub segments: u64,
    /// Records delivered to the caller.
    pub matched: u64,
    /// Entities that matched but could not be decoded.
    pub skipped: u64,
}

/// Run `query` and hand every decoded record to `on_record`, page by page.
pub async fn stream_query<S, F>(
    store: &S,
    query: VehicleQuery,
    retry: RetryPolicy,
    mut on_record: F,
) -> Result<QueryReport, QueryError>
where
    S: TableStore + ?Sized,
    F: FnMut(&VehicleRecord) -> io::Result<()>,
{
    let filter = query.filter();
    info!("Querying {} ({})", query, filter);

    let mut pager = SegmentPager::new(store, Some(filter)).with_retry(retry);
    let mut report = QueryReport::default();

    while let Some(segment) = pager.next_segment().await? {
        report.segments += 1;
        debug!(
            "Segment {}: {} entities",
            report.segments,
            segment.results.len()
        );

        for entity in &segment.results {
            match VehicleRecord::try_from(entity) {
                Ok(record) => {
                    on_record(&record)?;
                    report.matched += 1;
                }
                Err(e) => {
                    warn!("Skipping undecodable entity: {e}");
                    report.skipped += 1;
                }
            }
        }
    }

    info!(
        "Query '{}' returned {} records over {} segments ({} skipped)",
        query, report.matched, report.segments, report.skipped
    );
    Ok(report)
}

/// Run `query` and print one line per matching record.
pub async fn print_query<S, W>(
    store: &S,
    query: VehicleQuery,
    retry: RetryPolicy,
    out: &mut W,
) -> Result<QueryReport, QueryError>
where
    S: TableStore + ?Sized,
    W: Write,
{
    let report = stream_query(store, query, retry, |record| writeln!(out, "{record}")).await?;
    out.flush()?;
    Ok(report)
}
