//! Value type classification
//!
//! Maps the shape of a registry value to the WiX `RegistryValue/@Type`
//! it is written as. Rules are ordered, first match wins:
//!
//! 1. text containing a newline is `multiString`
//! 2. other text containing `%` is `expandable`
//! 3. any other text is `string`
//! 4. bytes are `binary`
//! 5. 16 and 32-bit integers are `integer`

use crate::types::RegValue;
use crate::{RegError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeTag {
    String,
    MultiString,
    Expandable,
    Binary,
    Integer,
}

impl TypeTag {
    /// WiX `Type` attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::MultiString => "multiString",
            TypeTag::Expandable => "expandable",
            TypeTag::Binary => "binary",
            TypeTag::Integer => "integer",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn classify(value: &RegValue) -> TypeTag {
    match value {
        RegValue::Text(s) if s.contains('\n') => TypeTag::MultiString,
        RegValue::Text(s) if s.contains('%') => TypeTag::Expandable,
        RegValue::Text(_) => TypeTag::String,
        RegValue::Binary(_) => TypeTag::Binary,
        RegValue::Int16(_) | RegValue::Int32(_) => TypeTag::Integer,
    }
}

impl RegValue {
    /// Convert an untyped YAML value.
    ///
    /// Null yields `None` (a value that is not set). Integers must fit in
    /// 32 bits. Binary data is written as `{ binary: "DE AD BE EF" }` and an
    /// explicit 16-bit integer as `{ int16: 5 }`.
    pub fn from_yaml(value: &Value) -> Result<Option<RegValue>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(RegValue::Text(s.clone()))),
            Value::Number(n) => match n.as_i64().map(i32::try_from) {
                Some(Ok(i)) => Ok(Some(RegValue::Int32(i))),
                Some(Err(_)) => Err(unsupported(format!("64-bit integer {}", n))),
                None if n.is_f64() => Err(unsupported(format!("floating point number {}", n))),
                None => Err(unsupported(format!("64-bit integer {}", n))),
            },
            Value::Bool(b) => Err(unsupported(format!("boolean {}", b))),
            Value::Sequence(_) => Err(unsupported("sequence".to_string())),
            Value::Mapping(map) => typed_from_mapping(map).map(Some),
            Value::Tagged(tagged) => Err(unsupported(format!("tagged value {}", tagged.tag))),
        }
    }

    /// Inverse of [`RegValue::from_yaml`]
    pub fn to_yaml(&self) -> Value {
        match self {
            RegValue::Text(s) => Value::String(s.clone()),
            RegValue::Int32(i) => Value::Number((*i).into()),
            RegValue::Int16(i) => single("int16", Value::Number((*i).into())),
            RegValue::Binary(bytes) => single("binary", Value::String(hex::encode_upper(bytes))),
        }
    }
}

fn typed_from_mapping(map: &Mapping) -> Result<RegValue> {
    if map.len() != 1 {
        return Err(unsupported(format!("mapping with {} keys", map.len())));
    }

    match map.iter().next() {
        Some((Value::String(tag), Value::String(data))) if tag == "binary" => {
            let digits: String = data
                .chars()
                .filter(|c| !matches!(c, ' ' | ',' | '-'))
                .collect();
            Ok(RegValue::Binary(hex::decode(digits)?))
        }
        Some((Value::String(tag), Value::Number(n))) if tag == "int16" => n
            .as_i64()
            .and_then(|i| i16::try_from(i).ok())
            .map(RegValue::Int16)
            .ok_or_else(|| unsupported(format!("int16 out of range: {}", n))),
        Some((Value::String(tag), _)) => Err(unsupported(format!("mapping tagged '{}'", tag))),
        _ => Err(unsupported("mapping".to_string())),
    }
}

fn single(tag: &str, value: Value) -> Value {
    let mut map = Mapping::new();
    map.insert(Value::String(tag.to_string()), value);
    Value::Mapping(map)
}

fn unsupported(what: String) -> RegError {
    RegError::UnsupportedValueType(what)
}
