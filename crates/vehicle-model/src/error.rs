use thiserror::Error;

/// Errors decoding a stored entity into a vehicle record.
#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    #[error("Entity {key} is missing property '{property}'")]
    MissingProperty { key: String, property: &'static str },

    #[error("Entity {key} has a {found} value for '{property}', expected {expected}")]
    WrongType {
        key: String,
        property: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Entity {key} has out-of-range value {value} for '{property}'")]
    OutOfRange {
        key: String,
        property: &'static str,
        value: i64,
    },
}
