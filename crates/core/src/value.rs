//! Value type definitions for Cambium.
//!
//! This module defines the `Value` enum which represents any value that can be held
//! by a row cell, either stored or produced by an expression.

use crate::types::DataType;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

/// A value held by a row cell.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// DateTime stored as Unix timestamp in milliseconds
    DateTime(i64),
    /// Binary data
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the data type of this value, or None if it's Null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int32(_) => Some(DataType::Int32),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::String(_) => Some(DataType::String),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Bytes(_) => Some(DataType::Bytes),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value if this is a Boolean, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i32 value if this is an Int32, None otherwise.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i64 value if this is an Int64, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if this is a Float64, None otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the datetime timestamp if this is a DateTime, None otherwise.
    pub fn as_datetime(&self) -> Option<i64> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the bytes if this is Bytes, None otherwise.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Widens any numeric value to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns true if this value may be stored in a column of the given type.
    ///
    /// Null is accepted here; nullability is checked by the caller.
    pub fn fits(&self, dt: DataType) -> bool {
        match self.data_type() {
            None => true,
            Some(own) => own == dt,
        }
    }

    /// Converts this value into the given type.
    ///
    /// Numeric values convert between each other, floats truncating towards
    /// zero. A value out of the target range, NaN and anything else that does
    /// not already have the target type become Null.
    pub fn coerce(self, dt: DataType) -> Value {
        if self.fits(dt) {
            return self;
        }
        match (dt, &self) {
            (DataType::Int32, Value::Int64(v)) => {
                i32::try_from(*v).map(Value::Int32).unwrap_or(Value::Null)
            }
            (DataType::Int32, Value::Float64(v))
                if *v > i32::MIN as f64 - 1.0 && *v < i32::MAX as f64 + 1.0 =>
            {
                Value::Int32(*v as i32)
            }
            (DataType::Int64, Value::Int32(v)) => Value::Int64(*v as i64),
            // i64::MIN is exact as f64; i64::MAX rounds up to 2^63.
            (DataType::Int64, Value::Float64(v)) if *v >= i64::MIN as f64 && *v < i64::MAX as f64 => {
                Value::Int64(*v as i64)
            }
            (DataType::Float64, Value::Int32(v)) => Value::Float64(*v as f64),
            (DataType::Float64, Value::Int64(v)) => Value::Float64(*v as f64),
            (DataType::DateTime, Value::Int64(v)) => Value::DateTime(*v),
            _ => Value::Null,
        }
    }

    /// Creates a default value for the given data type.
    pub fn default_for_type(dt: DataType) -> Self {
        match dt {
            DataType::Boolean => Value::Boolean(false),
            DataType::Int32 => Value::Int32(0),
            DataType::Int64 => Value::Int64(0),
            DataType::Float64 => Value::Float64(0.0),
            DataType::String => Value::String(String::new()),
            DataType::DateTime => Value::DateTime(0),
            DataType::Bytes => Value::Null,
        }
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int32(_) => 2,
            Value::Int64(_) => 3,
            Value::Float64(_) => 4,
            Value::String(_) => 5,
            Value::DateTime(_) => 6,
            Value::Bytes(_) => 7,
        }
    }
}

/// Total order over f64 with NaN sorted above every other number.
fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            // Numerically equal values of different types are not equal, so
            // they order by type.
            (Value::Int32(a), Value::Int64(b)) => (*a as i64).cmp(b).then(Ordering::Less),
            (Value::Int64(a), Value::Int32(b)) => a.cmp(&(*b as i64)).then(Ordering::Greater),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (a, b) => match (a.to_f64(), b.to_f64()) {
                (Some(x), Some(y)) => {
                    cmp_f64(x, y).then_with(|| a.type_order().cmp(&b.type_order()))
                }
                _ => a.type_order().cmp(&b.type_order()),
            },
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) => i.hash(state),
            // Equal floats hash alike: every NaN, and 0.0 with -0.0.
            Value::Float64(f) if f.is_nan() => f64::NAN.to_bits().hash(state),
            Value::Float64(f) if *f == 0.0 => 0u64.hash(state),
            Value::Float64(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Bytes(b) => b.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
