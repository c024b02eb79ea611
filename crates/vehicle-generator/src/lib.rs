//! Synthetic vehicle data for carlot.
//!
//! [`VehicleGenerator`] draws [`VehicleRecord`](vehicle_model::VehicleRecord)s
//! from a seeded RNG, so a run can be reproduced from its seed.
//! [`Populator`] writes them to a [`TableStore`](table_store::TableStore) one
//! upsert at a time.
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryTableStore::new("Cars");
//! store.create_table_if_not_exists().await?;
//!
//! let mut populator = Populator::new(&store, VehicleGenerator::new(42));
//! let metrics = populator.populate(1000).await?;
//! println!("{:.2} rows/sec", metrics.rows_per_second());
//! ```

pub mod error;
pub mod generator;
pub mod pools;
pub mod populator;

pub use error::PopulateError;
pub use generator::VehicleGenerator;
pub use populator::{FailedRecord, PopulateMetrics, Populator};
