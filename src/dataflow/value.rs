//! Typed payload carried by every message node.
//!
//! `Value` is a closed sum type over the payload kinds that flow through the
//! message fabric: booleans, integers, doubles, strings and opaque driver
//! handles. Extraction is exact: `get::<f64>()` on an integer fails with
//! [`DataflowError::TypeMismatch`] instead of converting.
//!
//! Copying a `Value` clones the payload; [`Value::take`] moves it out and
//! leaves the source empty.

use crate::dataflow::interface::DriverHandle;
use crate::error::{DataflowError, Result};
use std::fmt;

/// Discriminant of the payload currently stored in a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Empty,
    Bool,
    Int,
    Double,
    String,
    Handle,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Empty => "empty",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Handle => "handle",
        };
        f.write_str(name)
    }
}

/// A single typed payload, or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Handle(DriverHandle),
}

/// Types that can be stored in and extracted from a [`Value`].
pub trait ValueType: Sized {
    /// The discriminant this type is stored under.
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    /// Returns a copy of the payload if `value` stores exactly this type.
    fn from_value(value: &Value) -> Option<Self>;
}

impl ValueType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl ValueType for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl ValueType for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_double()
    }
}

impl ValueType for String {
    const KIND: ValueKind = ValueKind::String;

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl ValueType for DriverHandle {
    const KIND: ValueKind = ValueKind::Handle;

    fn into_value(self) -> Value {
        Value::Handle(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_handle().cloned()
    }
}

impl Value {
    /// Create a value holding `value`.
    pub fn new<T: ValueType>(value: T) -> Self {
        value.into_value()
    }

    /// The discriminant of the stored payload.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Empty => ValueKind::Empty,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Handle(_) => ValueKind::Handle,
        }
    }

    /// Replace the stored payload. The previous payload is dropped first.
    pub fn set(&mut self, value: impl Into<Value>) {
        *self = value.into();
    }

    /// Copy out the payload as `T`.
    ///
    /// Fails with `TypeMismatch` when the value is empty or stores another type.
    pub fn get<T: ValueType>(&self) -> Result<T> {
        T::from_value(self).ok_or(DataflowError::TypeMismatch {
            expected: T::KIND,
            found: self.kind(),
        })
    }

    /// Whether the stored payload is exactly a `T`.
    pub fn is<T: ValueType>(&self) -> bool {
        self.kind() == T::KIND
    }

    pub fn has_value(&self) -> bool {
        !matches!(self, Value::Empty)
    }

    /// Drop the payload and return to empty.
    pub fn reset(&mut self) {
        *self = Value::Empty;
    }

    /// Move the payload out, leaving this value empty.
    pub fn take(&mut self) -> Value {
        std::mem::take(self)
    }

    /// Whether `Display` renders the payload itself rather than a placeholder.
    pub fn is_printable(&self) -> bool {
        !matches!(self, Value::Handle(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&DriverHandle> {
        match self {
            Value::Handle(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Handle(_) => f.write_str("???"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

/// Integers are always stored as `i64`.
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
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

impl From<DriverHandle> for Value {
    fn from(v: DriverHandle) -> Self {
        Value::Handle(v)
    }
}
