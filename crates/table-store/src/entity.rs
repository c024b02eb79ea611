//! Property-bag entities and their JSON (OData) wire form.

use crate::error::StoreError;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the system property holding the partition key.
pub const PARTITION_KEY: &str = "PartitionKey";
/// Name of the system property holding the row key.
pub const ROW_KEY: &str = "RowKey";

const ODATA_TYPE_SUFFIX: &str = "@odata.type";
const ODATA_ETAG: &str = "odata.etag";
const TIMESTAMP: &str = "Timestamp";

/// A typed property value as understood by the table service.
#[derive(Debug, Clone, PartialEq)]
pub enum EdmValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
}

impl EdmValue {
    /// EDM type name used in `@odata.type` annotations.
    pub fn type_name(&self) -> &'static str {
        match self {
            EdmValue::String(_) => "Edm.String",
            EdmValue::Int32(_) => "Edm.Int32",
            EdmValue::Int64(_) => "Edm.Int64",
            EdmValue::Double(_) => "Edm.Double",
            EdmValue::Boolean(_) => "Edm.Boolean",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EdmValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of `Int32` and `Int64` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EdmValue::Int32(v) => Some(i64::from(*v)),
            EdmValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Floating point view of any numeric value.
    ///
    /// The service drops the `Edm.Double` annotation for whole numbers in some
    /// payload formats, so a double column can come back as an integer.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EdmValue::Double(v) => Some(*v),
            EdmValue::Int32(v) => Some(f64::from(*v)),
            EdmValue::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EdmValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    fn to_json(&self) -> (Value, Option<&'static str>) {
        match self {
            EdmValue::String(s) => (Value::String(s.clone()), None),
            EdmValue::Int32(v) => (Value::Number((*v).into()), None),
            EdmValue::Int64(v) => (Value::String(v.to_string()), Some("Edm.Int64")),
            EdmValue::Double(v) => {
                let value = match Number::from_f64(*v) {
                    Some(n) => Value::Number(n),
                    None => Value::String(non_finite_literal(*v).to_string()),
                };
                (value, Some("Edm.Double"))
            }
            EdmValue::Boolean(b) => (Value::Bool(*b), None),
        }
    }
}

fn non_finite_literal(v: f64) -> &'static str {
    if v.is_nan() {
        "NaN"
    } else if v.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

impl fmt::Display for EdmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdmValue::String(s) => write!(f, "{s}"),
            EdmValue::Int32(v) => write!(f, "{v}"),
            EdmValue::Int64(v) => write!(f, "{v}"),
            EdmValue::Double(v) => write!(f, "{v}"),
            EdmValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for EdmValue {
    fn from(s: &str) -> Self {
        EdmValue::String(s.to_string())
    }
}

impl From<String> for EdmValue {
    fn from(s: String) -> Self {
        EdmValue::String(s)
    }
}

impl From<i32> for EdmValue {
    fn from(v: i32) -> Self {
        EdmValue::Int32(v)
    }
}

impl From<i64> for EdmValue {
    fn from(v: i64) -> Self {
        EdmValue::Int64(v)
    }
}

impl From<f64> for EdmValue {
    fn from(v: f64) -> Self {
        EdmValue::Double(v)
    }
}

impl From<bool> for EdmValue {
    fn from(b: bool) -> Self {
        EdmValue::Boolean(b)
    }
}

/// A table row: the two-part key, an optional ETag and named properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub partition_key: String,
    pub row_key: String,
    /// Version tag assigned by the store; `None` for entities not yet written.
    pub etag: Option<String>,
    pub properties: BTreeMap<String, EdmValue>,
}

impl Entity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: None,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<EdmValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<EdmValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&EdmValue> {
        self.properties.get(name)
    }

    /// Serialize into the JSON body used by insert/update requests.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            PARTITION_KEY.to_string(),
            Value::String(self.partition_key.clone()),
        );
        object.insert(ROW_KEY.to_string(), Value::String(self.row_key.clone()));
        for (name, value) in &self.properties {
            let (json, annotation) = value.to_json();
            if let Some(type_name) = annotation {
                object.insert(
                    format!("{name}{ODATA_TYPE_SUFFIX}"),
                    Value::String(type_name.to_string()),
                );
            }
            object.insert(name.clone(), json);
        }
        Value::Object(object)
    }

    /// Decode an entity from a query response element.
    pub fn from_json(value: &Value) -> Result<Self, StoreError> {
        let object = value
            .as_object()
            .ok_or_else(|| StoreError::MalformedResponse("entity is not a JSON object".into()))?;

        let partition_key = required_string(object, PARTITION_KEY)?;
        let row_key = required_string(object, ROW_KEY)?;
        let mut entity = Entity::new(partition_key, row_key);
        entity.etag = object
            .get(ODATA_ETAG)
            .and_then(Value::as_str)
            .map(str::to_string);

        for (name, json) in object {
            if name == PARTITION_KEY
                || name == ROW_KEY
                || name == TIMESTAMP
                || name.starts_with("odata.")
                || name.contains('@')
            {
                continue;
            }
            let annotation = object
                .get(&format!("{name}{ODATA_TYPE_SUFFIX}"))
                .and_then(Value::as_str);
            if let Some(value) = decode_property(name, annotation, json)? {
                entity.properties.insert(name.clone(), value);
            }
        }

        Ok(entity)
    }
}

fn required_string(object: &Map<String, Value>, key: &str) -> Result<String, StoreError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::MalformedResponse(format!("entity is missing '{key}'")))
}

fn decode_property(
    name: &str,
    annotation: Option<&str>,
    json: &Value,
) -> Result<Option<EdmValue>, StoreError> {
    let malformed = || {
        StoreError::MalformedResponse(format!(
            "property '{name}' has unexpected value {json} for type {}",
            annotation.unwrap_or("<none>")
        ))
    };

    let value = match (annotation, json) {
        (_, Value::Null) => return Ok(None),
        (Some("Edm.Int64"), Value::String(s)) => {
            EdmValue::Int64(s.parse().map_err(|_| malformed())?)
        }
        (Some("Edm.Double"), Value::String(s)) => {
            EdmValue::Double(parse_double(s).ok_or_else(malformed)?)
        }
        (Some("Edm.Double"), Value::Number(n)) => EdmValue::Double(n.as_f64().ok_or_else(malformed)?),
        // DateTime, Guid and Binary are kept in their textual form.
        (_, Value::String(s)) => EdmValue::String(s.clone()),
        (_, Value::Bool(b)) => EdmValue::Boolean(*b),
        (_, Value::Number(n)) => match n.as_i64() {
            Some(i) => match i32::try_from(i) {
                Ok(small) => EdmValue::Int32(small),
                Err(_) => EdmValue::Int64(i),
            },
            None => EdmValue::Double(n.as_f64().ok_or_else(malformed)?),
        },
        _ => return Err(malformed()),
    };
    Ok(Some(value))
}
