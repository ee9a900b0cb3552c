//! Data type definitions for Cambium.
//!
//! This module defines the value types a column can hold.

/// Supported column data types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
}

impl DataType {
    /// Returns the default value for this data type as a string representation.
    pub fn default_value_repr(&self) -> &'static str {
        match self {
            DataType::Boolean => "false",
            DataType::Int32 => "0",
            DataType::Int64 => "0",
            DataType::Float64 => "0.0",
            DataType::String => "\"\"",
            DataType::DateTime => "0",
            DataType::Bytes => "[]",
        }
    }

    /// Returns whether this type is nullable by default.
    pub fn is_nullable_by_default(&self) -> bool {
        matches!(self, DataType::Bytes)
    }

    /// Returns whether values of this type take part in arithmetic and numeric aggregates.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }
}
