//! Field type registry.
//!
//! Maps the logical field types a collection declares to the physical column
//! types of the store. Compiled callers use [`LogicalType`] directly; schema
//! descriptions arriving from outside carry type *names*, which are parsed
//! with [`LogicalType::from_str`](std::str::FromStr) and may fail with
//! [`FieldTypeError::UnknownFieldType`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FieldTypeError;

/// Largest vector dimension a field may declare.
pub const MAX_DIMENSION: u32 = 16_000;

/// Field types a collection can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    String,
    Int32,
    Int64,
    Float,
    Bool,
    Vector,
}

impl LogicalType {
    /// All logical types, in declaration order.
    pub const ALL: [LogicalType; 6] = [
        LogicalType::String,
        LogicalType::Int32,
        LogicalType::Int64,
        LogicalType::Float,
        LogicalType::Bool,
        LogicalType::Vector,
    ];

    /// Returns the canonical type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::String => "String",
            LogicalType::Int32 => "Int32",
            LogicalType::Int64 => "Int64",
            LogicalType::Float => "Float",
            LogicalType::Bool => "Bool",
            LogicalType::Vector => "Vector",
        }
    }
}

impl FromStr for LogicalType {
    type Err = FieldTypeError;

    /// Parses a type name. `Integer32`, `Integer64` and `Boolean` are accepted
    /// as aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(LogicalType::String),
            "Int32" | "Integer32" => Ok(LogicalType::Int32),
            "Int64" | "Integer64" => Ok(LogicalType::Int64),
            "Float" => Ok(LogicalType::Float),
            "Bool" | "Boolean" => Ok(LogicalType::Bool),
            "Vector" => Ok(LogicalType::Vector),
            other => Err(FieldTypeError::UnknownFieldType(other.to_string())),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column types of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalType {
    Text,
    Integer,
    BigInt,
    Float,
    Boolean,
    Vector(u32),
}

impl PhysicalType {
    /// Returns the vector dimension for vector columns.
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        match self {
            PhysicalType::Vector(dim) => Some(*dim as usize),
            _ => None,
        }
    }

    /// Returns true for vector columns.
    #[inline]
    pub fn is_vector(&self) -> bool {
        matches!(self, PhysicalType::Vector(_))
    }

    /// Returns the logical type this column was declared with.
    pub fn logical(&self) -> LogicalType {
        match self {
            PhysicalType::Text => LogicalType::String,
            PhysicalType::Integer => LogicalType::Int32,
            PhysicalType::BigInt => LogicalType::Int64,
            PhysicalType::Float => LogicalType::Float,
            PhysicalType::Boolean => LogicalType::Bool,
            PhysicalType::Vector(_) => LogicalType::Vector,
        }
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalType::Text => f.write_str("TEXT"),
            PhysicalType::Integer => f.write_str("INTEGER"),
            PhysicalType::BigInt => f.write_str("BIGINT"),
            PhysicalType::Float => f.write_str("FLOAT"),
            PhysicalType::Boolean => f.write_str("BOOLEAN"),
            PhysicalType::Vector(dim) => write!(f, "VECTOR({dim})"),
        }
    }
}

/// Resolves a logical type and optional dimension to a physical type.
///
/// # Example
///
/// ```
/// use vectorbase_core::field::{resolve_physical_type, LogicalType, PhysicalType};
///
/// assert_eq!(
///     resolve_physical_type(LogicalType::Vector, Some(384)),
///     Ok(PhysicalType::Vector(384))
/// );
/// assert!(resolve_physical_type(LogicalType::Vector, None).is_err());
/// ```
pub fn resolve_physical_type(
    logical: LogicalType,
    dimension: Option<u32>,
) -> Result<PhysicalType, FieldTypeError> {
    match (logical, dimension) {
        (LogicalType::Vector, Some(dim)) if dim > MAX_DIMENSION => {
            Err(FieldTypeError::DimensionTooLarge {
                got: dim,
                max: MAX_DIMENSION,
            })
        }
        (LogicalType::Vector, Some(dim)) if dim > 0 => Ok(PhysicalType::Vector(dim)),
        (LogicalType::Vector, _) => Err(FieldTypeError::MissingDimension),
        (other, Some(_)) => Err(FieldTypeError::UnexpectedDimension(other.to_string())),
        (LogicalType::String, None) => Ok(PhysicalType::Text),
        (LogicalType::Int32, None) => Ok(PhysicalType::Integer),
        (LogicalType::Int64, None) => Ok(PhysicalType::BigInt),
        (LogicalType::Float, None) => Ok(PhysicalType::Float),
        (LogicalType::Bool, None) => Ok(PhysicalType::Boolean),
    }
}

/// Resolves a type given by name.
pub fn resolve_named(
    type_name: &str,
    dimension: Option<u32>,
) -> Result<PhysicalType, FieldTypeError> {
    resolve_physical_type(type_name.parse()?, dimension)
}

/// A field declaration as submitted by a caller.
///
/// The type is kept as a name so that declarations from untrusted sources can
/// be deserialized before they are checked. Use the typed constructors when
/// building schemas in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<u32>,
    #[serde(default)]
    pub is_primary: bool,
    /// Records may supply text for this field, to be embedded on insert.
    #[serde(default)]
    pub embeddable: bool,
}

impl FieldSpec {
    /// Creates a field of the given logical type.
    pub fn new(name: impl Into<String>, logical: LogicalType) -> Self {
        Self::named(name, logical.as_str())
    }

    /// Creates a field from a type name, without checking it.
    pub fn named(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            dimension: None,
            is_primary: false,
            embeddable: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::String)
    }

    pub fn int32(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Int32)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Int64)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Bool)
    }

    /// Creates a vector field of the given dimension.
    pub fn vector(name: impl Into<String>, dimension: u32) -> Self {
        Self::new(name, LogicalType::Vector).with_dimension(dimension)
    }

    /// Sets the dimension. Chainable.
    pub fn with_dimension(mut self, dimension: u32) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Marks the field as the primary key. Chainable.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Marks the field as embeddable. Chainable.
    pub fn embeddable(mut self) -> Self {
        self.embeddable = true;
        self
    }

    /// Resolves the physical column type for this field.
    pub fn resolve(&self) -> Result<PhysicalType, FieldTypeError> {
        let physical = resolve_named(&self.type_name, self.dimension)?;
        if self.embeddable && !physical.is_vector() {
            return Err(FieldTypeError::NotEmbeddable(self.type_name.clone()));
        }
        Ok(physical)
    }
}
