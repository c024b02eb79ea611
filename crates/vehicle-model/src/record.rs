//! The vehicle record and its mapping onto table entities.

use crate::error::ModelError;
use crate::region::Region;
use std::fmt;
use table_store::{EdmValue, Entity};

/// Store property names.
pub mod fields {
    pub const CITY: &str = "City";
    pub const BRAND: &str = "Brand";
    pub const MODEL: &str = "Model";
    pub const PRODUCTION_YEAR: &str = "ProductionYear";
    pub const BODY_TYPE: &str = "BodyType";
    pub const SEATS_COUNT: &str = "SeatsCount";
    pub const ENGINE_CAPACITY: &str = "EngineCapacity";
    pub const ENGINE_TYPE: &str = "EngineType";
    pub const MILEAGE: &str = "Mileage";
}

/// A vehicle listing, keyed by `(region, sequence_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    pub region: Region,
    pub sequence_id: String,
    pub city: String,
    pub brand: String,
    pub model: String,
    pub production_year: i32,
    pub body_type: String,
    pub seat_count: u32,
    /// Liters, one fractional digit.
    pub engine_capacity_liters: f64,
    pub engine_type: String,
    pub mileage_km: u32,
}

impl VehicleRecord {
    /// `(partition key, row key)` of this record.
    pub fn key(&self) -> (&'static str, &str) {
        (self.region.as_str(), &self.sequence_id)
    }

    pub fn to_entity(&self) -> Entity {
        Entity::new(self.region.as_str(), self.sequence_id.clone())
            .with_property(fields::CITY, self.city.as_str())
            .with_property(fields::BRAND, self.brand.as_str())
            .with_property(fields::MODEL, self.model.as_str())
            .with_property(fields::PRODUCTION_YEAR, self.production_year)
            .with_property(fields::BODY_TYPE, self.body_type.as_str())
            .with_property(fields::SEATS_COUNT, count_value(self.seat_count))
            .with_property(fields::ENGINE_CAPACITY, self.engine_capacity_liters)
            .with_property(fields::ENGINE_TYPE, self.engine_type.as_str())
            .with_property(fields::MILEAGE, count_value(self.mileage_km))
    }
}

/// Counts fit Int32 in practice; larger values keep full width as Int64.
fn count_value(value: u32) -> EdmValue {
    match i32::try_from(value) {
        Ok(v) => EdmValue::Int32(v),
        Err(_) => EdmValue::Int64(i64::from(value)),
    }
}

impl From<&VehicleRecord> for Entity {
    fn from(record: &VehicleRecord) -> Self {
        record.to_entity()
    }
}

struct EntityReader<'a> {
    entity: &'a Entity,
}

impl<'a> EntityReader<'a> {
    fn key(&self) -> String {
        format!("{}/{}", self.entity.partition_key, self.entity.row_key)
    }

    fn value(&self, property: &'static str) -> Result<&'a EdmValue, ModelError> {
        self.entity
            .get(property)
            .ok_or_else(|| ModelError::MissingProperty {
                key: self.key(),
                property,
            })
    }

    fn wrong_type(
        &self,
        property: &'static str,
        expected: &'static str,
        found: &EdmValue,
    ) -> ModelError {
        ModelError::WrongType {
            key: self.key(),
            property,
            expected,
            found: found.type_name(),
        }
    }

    fn string(&self, property: &'static str) -> Result<String, ModelError> {
        let value = self.value(property)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.wrong_type(property, "Edm.String", value))
    }

    fn integer(&self, property: &'static str) -> Result<i64, ModelError> {
        let value = self.value(property)?;
        value
            .as_i64()
            .ok_or_else(|| self.wrong_type(property, "Edm.Int32", value))
    }

    fn count(&self, property: &'static str) -> Result<u32, ModelError> {
        let value = self.integer(property)?;
        u32::try_from(value).map_err(|_| ModelError::OutOfRange {
            key: self.key(),
            property,
            value,
        })
    }

    fn year(&self, property: &'static str) -> Result<i32, ModelError> {
        let value = self.integer(property)?;
        i32::try_from(value).map_err(|_| ModelError::OutOfRange {
            key: self.key(),
            property,
            value,
        })
    }

    fn double(&self, property: &'static str) -> Result<f64, ModelError> {
        let value = self.value(property)?;
        value
            .as_f64()
            .ok_or_else(|| self.wrong_type(property, "Edm.Double", value))
    }
}

impl TryFrom<&Entity> for VehicleRecord {
    type Error = ModelError;

    fn try_from(entity: &Entity) -> Result<Self, Self::Error> {
        let reader = EntityReader { entity };
        Ok(Self {
            region: entity.partition_key.parse()?,
            sequence_id: entity.row_key.clone(),
            city: reader.string(fields::CITY)?,
            brand: reader.string(fields::BRAND)?,
            model: reader.string(fields::MODEL)?,
            production_year: reader.year(fields::PRODUCTION_YEAR)?,
            body_type: reader.string(fields::BODY_TYPE)?,
            seat_count: reader.count(fields::SEATS_COUNT)?,
            engine_capacity_liters: reader.double(fields::ENGINE_CAPACITY)?,
            engine_type: reader.string(fields::ENGINE_TYPE)?,
            mileage_km: reader.count(fields::MILEAGE)?,
        })
    }
}

impl fmt::Display for VehicleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PartitionKey: {}, RowKey: {}, City: {}, Brand: {}, Model: {}, ProductionYear: {}, \
             BodyType: {}, EngineCapacity: {:.1}, SeatsCount: {}, EngineType: {}, Mileage: {}",
            self.region,
            self.sequence_id,
            self.city,
            self.brand,
            self.model,
            self.production_year,
            self.body_type,
            self.engine_capacity_liters,
            self.seat_count,
            self.engine_type,
            self.mileage_km
        )
    }
}
