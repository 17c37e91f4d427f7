use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Fixed-point decimal as the table service stores it: an unscaled integer plus
/// precision/scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub value: i128,
    pub precision: u32,
    pub scale: u32,
}

impl Decimal {
    #[must_use]
    pub const fn new(value: i128, precision: u32, scale: u32) -> Self {
        Self {
            value,
            precision,
            scale,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.value.unsigned_abs().to_string();
        let sign = if self.value < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int}.{frac}")
        } else {
            write!(f, "{sign}0.{digits:0>scale$}")
        }
    }
}

/// Typed value exchanged with the backend, as a parameter or as a result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float(f32),
    Double(f64),
    /// Binary string.
    Bytes(Vec<u8>),
    Utf8(String),
    Uuid(Uuid),
    Json(JsonValue),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
    /// Nullable wrapper; `Optional(None)` is a typed NULL.
    Optional(Option<Box<Value>>),
    Void,
}

impl Value {
    #[must_use]
    pub fn optional(value: Value) -> Self {
        Self::Optional(Some(Box::new(value)))
    }

    #[must_use]
    pub fn null() -> Self {
        Self::Optional(None)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Optional(None) | Self::Void)
    }

    /// Strip every `Optional` layer, returning `None` for a NULL.
    #[must_use]
    pub fn unwrap_optional(&self) -> Option<&Value> {
        match self {
            Self::Optional(Some(inner)) => inner.unwrap_optional(),
            Self::Optional(None) | Self::Void => None,
            other => Some(other),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "Bool",
            Self::Int8(_) => "Int8",
            Self::Uint8(_) => "Uint8",
            Self::Int16(_) => "Int16",
            Self::Uint16(_) => "Uint16",
            Self::Int32(_) => "Int32",
            Self::Uint32(_) => "Uint32",
            Self::Int64(_) => "Int64",
            Self::Uint64(_) => "Uint64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::Bytes(_) => "String",
            Self::Utf8(_) => "Utf8",
            Self::Uuid(_) => "Uuid",
            Self::Json(_) => "Json",
            Self::Date(_) => "Date",
            Self::Datetime(_) => "Datetime",
            Self::Timestamp(_) => "Timestamp",
            Self::Decimal(_) => "Decimal",
            Self::Optional(_) => "Optional",
            Self::Void => "Void",
        }
    }

    /// Widen any integer cell to `i64` when it fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self.unwrap_optional()? {
            Self::Int8(v) => Some(i64::from(*v)),
            Self::Uint8(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Uint16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Uint32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::Uint64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self.unwrap_optional()? {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Some(Self::Bool(v)) = self.unwrap_optional() {
            Some(*v)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self.unwrap_optional()? {
            Self::Utf8(s) => Some(s),
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.unwrap_optional()? {
            Self::Bytes(b) => Some(b),
            Self::Utf8(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        if let Some(Self::Uuid(v)) = self.unwrap_optional() {
            Some(*v)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        if let Some(Self::Decimal(v)) = self.unwrap_optional() {
            Some(*v)
        } else {
            None
        }
    }
}
