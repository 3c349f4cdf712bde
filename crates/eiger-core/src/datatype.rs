//! Type mapping from device value types to attribute datatypes.
//!
//! The detector tags each parameter with a `value_type` string. Only four
//! attribute datatypes exist on the control side, so several device tags
//! collapse onto `String`:
//!
//! | Device tag  | Attribute datatype |
//! |-------------|--------------------|
//! | `float`     | `Float`            |
//! | `int`       | `Int`              |
//! | `bool`      | `Bool`             |
//! | `string`    | `String`           |
//! | `datetime`  | `String`           |
//! | `State`     | `String`           |
//! | `string[]`  | `String`           |
//!
//! Any other tag is [`UnrecognizedValueType`]. Callers skip the parameter and
//! carry on; an unknown tag is never a process error.

use crate::error::{EigerError, EigerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Value type tag as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `datetime`
    Datetime,
    /// `State`
    State,
    /// `string[]`
    StringArray,
}

impl ValueType {
    /// Parse a device tag. Tags are case-sensitive, as the device sends them.
    pub fn parse(tag: &str) -> Option<Self> {
        let value_type = match tag {
            "float" => ValueType::Float,
            "int" => ValueType::Int,
            "bool" => ValueType::Bool,
            "string" => ValueType::String,
            "datetime" => ValueType::Datetime,
            "State" => ValueType::State,
            "string[]" => ValueType::StringArray,
            _ => return None,
        };
        Some(value_type)
    }

    /// Attribute datatype this tag maps onto.
    pub fn datatype(self) -> AttributeDatatype {
        match self {
            ValueType::Float => AttributeDatatype::Float,
            ValueType::Int => AttributeDatatype::Int,
            ValueType::Bool => AttributeDatatype::Bool,
            ValueType::String | ValueType::Datetime | ValueType::State | ValueType::StringArray => {
                AttributeDatatype::String
            }
        }
    }
}

/// A `value_type` tag the type mapper does not know.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized value type '{0}'")]
pub struct UnrecognizedValueType(pub String);

/// Datatype of a control-side attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeDatatype {
    /// 64-bit float
    Float,
    /// 64-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// UTF-8 string
    String,
}

/// Map a device `value_type` tag onto an attribute datatype.
pub fn map_value_type(tag: &str) -> Result<AttributeDatatype, UnrecognizedValueType> {
    ValueType::parse(tag)
        .map(ValueType::datatype)
        .ok_or_else(|| UnrecognizedValueType(tag.to_string()))
}

impl AttributeDatatype {
    /// Lowercase name, as used in logs and metadata `dtype`.
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeDatatype::Float => "float",
            AttributeDatatype::Int => "int",
            AttributeDatatype::Bool => "bool",
            AttributeDatatype::String => "string",
        }
    }

    /// Value an attribute holds before its first successful poll.
    pub fn default_value(self) -> AttributeValue {
        match self {
            AttributeDatatype::Float => AttributeValue::Float(0.0),
            AttributeDatatype::Int => AttributeValue::Int(0),
            AttributeDatatype::Bool => AttributeValue::Bool(false),
            AttributeDatatype::String => AttributeValue::String(String::new()),
        }
    }

    /// Decode a device JSON value into this datatype.
    ///
    /// `String` attributes accept anything: strings pass through, `null`
    /// becomes empty and other JSON (e.g. a `string[]` array) is rendered as
    /// compact JSON text.
    pub fn decode(self, path: &str, value: &Value) -> EigerResult<AttributeValue> {
        let decoded = match (self, value) {
            (AttributeDatatype::Float, Value::Number(n)) => n.as_f64().map(AttributeValue::Float),
            (AttributeDatatype::Int, Value::Number(n)) => n.as_i64().map(AttributeValue::Int),
            (AttributeDatatype::Bool, Value::Bool(b)) => Some(AttributeValue::Bool(*b)),
            (AttributeDatatype::String, Value::String(s)) => Some(AttributeValue::String(s.clone())),
            (AttributeDatatype::String, Value::Null) => Some(AttributeValue::String(String::new())),
            (AttributeDatatype::String, other) => Some(AttributeValue::String(other.to_string())),
            _ => None,
        };

        decoded.ok_or_else(|| EigerError::Decode {
            path: path.to_string(),
            expected: self.as_str(),
            found: json_kind(value).to_string(),
        })
    }
}

impl fmt::Display for AttributeDatatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Float value
    Float(f64),
    /// Integer value
    Int(i64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
}

impl AttributeValue {
    /// Datatype of this value.
    pub fn datatype(&self) -> AttributeDatatype {
        match self {
            AttributeValue::Float(_) => AttributeDatatype::Float,
            AttributeValue::Int(_) => AttributeDatatype::Int,
            AttributeValue::Bool(_) => AttributeDatatype::Bool,
            AttributeValue::String(_) => AttributeDatatype::String,
        }
    }

    /// JSON representation sent to the device.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Float(v) => Value::from(*v),
            AttributeValue::Int(v) => Value::from(*v),
            AttributeValue::Bool(v) => Value::from(*v),
            AttributeValue::String(v) => Value::from(v.as_str()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::String(v) => f.write_str(v),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
