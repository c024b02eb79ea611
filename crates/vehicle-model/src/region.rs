//! Continents used as partition keys.

use crate::error::ModelError;
use std::fmt;
use std::str::FromStr;

/// Partition a vehicle record is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Asia,
    Africa,
    NorthAmerica,
    SouthAmerica,
    Europe,
    Australia,
}

impl Region {
    /// Every region, in the order the generator draws from.
    pub const ALL: [Region; 6] = [
        Region::Asia,
        Region::Africa,
        Region::NorthAmerica,
        Region::SouthAmerica,
        Region::Europe,
        Region::Australia,
    ];

    /// Partition key value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Asia => "Asia",
            Region::Africa => "Africa",
            Region::NorthAmerica => "North America",
            Region::SouthAmerica => "South America",
            Region::Europe => "Europe",
            Region::Australia => "Australia",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|region| region.as_str() == s)
            .ok_or_else(|| ModelError::UnknownRegion(s.to_string()))
    }
}
