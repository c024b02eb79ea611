//! carlot
//!
//! An interactive demo over a partitioned key/value table of vehicle
//! listings. Records are partitioned by continent and keyed by an insertion
//! sequence number.
//!
//! # Commands
//!
//! - `C` - generate and upsert synthetic records ([`vehicle_generator`])
//! - `Z1`/`Z2`/`Z3` - run one of the fixed queries ([`query`])
//! - `D` - delete every record with per-partition batches ([`purge`])
//! - `X` - exit ([`menu`])
//!
//! # Crates
//!
//! - `table_store` - the table service client and its in-memory twin
//! - `vehicle_model` - the record schema and entity mapping
//! - `vehicle_generator` - seeded data generation and the populator

pub mod menu;
pub mod purge;
pub mod query;

pub use menu::{parse_command, run_menu, Command, MenuError, MenuEvent, MenuState, Session};
pub use purge::{
    chunk_group, delete_all, delete_all_with_progress, group_by_partition, PartitionGroup,
    PurgeError, PurgeReport,
};
pub use query::{print_query, stream_query, QueryError, QueryReport, VehicleQuery};
