//! Typed column values.
//!
//! Records arrive as JSON-like values; [`Value::from_json`] coerces them to the
//! physical type of the target column. The store only ever holds `Value`s that
//! fit their column.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::RowError;
use crate::field::PhysicalType;

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    Float(f64),
    Bool(bool),
    Vector(Vec<f32>),
}

/// Hashable form of a non-null value, used for primary-key lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum IndexKey {
    Text(String),
    Int(i64),
    Float(u64),
    Bool(bool),
    Vector(Vec<u32>),
}

impl Value {
    /// Coerces a JSON value to the given column type.
    ///
    /// `null` is accepted for every type; integers must fit the column width;
    /// vectors must have exactly the column's dimension and finite entries.
    pub fn from_json(field: &str, json: &JsonValue, ty: &PhysicalType) -> Result<Self, RowError> {
        let mismatch = || RowError::TypeMismatch {
            field: field.to_string(),
            expected: ty.to_string(),
            got: json_type_name(json).to_string(),
        };

        if json.is_null() {
            return Ok(Value::Null);
        }

        match ty {
            PhysicalType::Text => json
                .as_str()
                .map(|s| Value::Text(s.to_string()))
                .ok_or_else(mismatch),
            PhysicalType::Integer => json
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Int32)
                .ok_or_else(mismatch),
            PhysicalType::BigInt => json.as_i64().map(Value::Int64).ok_or_else(mismatch),
            PhysicalType::Float => {
                let n = json.as_f64().ok_or_else(mismatch)?;
                if !n.is_finite() {
                    return Err(RowError::NonFinite(field.to_string()));
                }
                Ok(Value::Float(n))
            }
            PhysicalType::Boolean => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
            PhysicalType::Vector(dim) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                let mut data = Vec::with_capacity(items.len());
                for item in items {
                    let n = item.as_f64().ok_or_else(mismatch)? as f32;
                    if !n.is_finite() {
                        return Err(RowError::NonFinite(field.to_string()));
                    }
                    data.push(n);
                }
                Value::vector(field, data, *dim as usize)
            }
        }
    }

    /// Builds a vector value, checking its dimension.
    pub fn vector(field: &str, data: Vec<f32>, dimension: usize) -> Result<Self, RowError> {
        if data.len() != dimension {
            return Err(RowError::DimensionMismatch {
                field: field.to_string(),
                expected: dimension,
                got: data.len(),
            });
        }
        Ok(Value::Vector(data))
    }

    /// Converts the value back to JSON.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Int32(n) => JsonValue::from(*n),
            Value::Int64(n) => JsonValue::from(*n),
            Value::Float(n) => JsonValue::from(*n),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Vector(v) => JsonValue::Array(v.iter().map(|x| JsonValue::from(*x)).collect()),
        }
    }

    /// Checks that the value can be stored in a column of type `ty`.
    pub fn check_fits(&self, field: &str, ty: &PhysicalType) -> Result<(), RowError> {
        let fits = match (self, ty) {
            (Value::Null, _) => true,
            (Value::Text(_), PhysicalType::Text)
            | (Value::Int32(_), PhysicalType::Integer)
            | (Value::Int64(_), PhysicalType::BigInt)
            | (Value::Bool(_), PhysicalType::Boolean) => true,
            (Value::Float(n), PhysicalType::Float) => {
                if !n.is_finite() {
                    return Err(RowError::NonFinite(field.to_string()));
                }
                true
            }
            (Value::Vector(v), PhysicalType::Vector(dim)) => {
                if v.len() != *dim as usize {
                    return Err(RowError::DimensionMismatch {
                        field: field.to_string(),
                        expected: *dim as usize,
                        got: v.len(),
                    });
                }
                if v.iter().any(|x| !x.is_finite()) {
                    return Err(RowError::NonFinite(field.to_string()));
                }
                true
            }
            _ => false,
        };

        if fits {
            Ok(())
        } else {
            Err(RowError::TypeMismatch {
                field: field.to_string(),
                expected: ty.to_string(),
                got: self.type_name().to_string(),
            })
        }
    }

    /// Returns a short name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Vector(_) => "vector",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the vector data, if this is a vector.
    #[inline]
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as an i64 for either integer width.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn index_key(&self) -> Option<IndexKey> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(IndexKey::Text(s.clone())),
            Value::Int32(n) => Some(IndexKey::Int(i64::from(*n))),
            Value::Int64(n) => Some(IndexKey::Int(*n)),
            // Normalize -0.0 so it collides with 0.0, matching `==`.
            Value::Float(n) => Some(IndexKey::Float((*n + 0.0).to_bits())),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Vector(v) => Some(IndexKey::Vector(v.iter().map(|x| x.to_bits()).collect())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn json_type_name(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "integer",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
