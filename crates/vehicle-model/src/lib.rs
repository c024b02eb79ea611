//! Vehicle record schema for carlot.
//!
//! A [`VehicleRecord`] is stored as one table entity: the [`Region`] is the
//! partition key, the sequence id is the row key and the remaining fields are
//! typed properties (see [`record::fields`]).

pub mod error;
pub mod record;
pub mod region;

pub use error::ModelError;
pub use record::{fields, VehicleRecord};
pub use region::Region;
