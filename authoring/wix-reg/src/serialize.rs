//! Rendering entries into the strings the WiX compiler consumes

use crate::classify::{classify, TypeTag};
use crate::types::{RegValue, RegistryEntry};
use crate::{RegError, Result};
use serde::Serialize;

/// `Type` and `Value` of a WiX `RegistryValue`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerializedValue {
    pub type_tag: TypeTag,
    pub payload: String,
}

pub fn serialize(entry: &RegistryEntry) -> Result<SerializedValue> {
    let value = entry
        .value
        .as_ref()
        .ok_or_else(|| RegError::NullValue(entry.name.clone()))?;

    let type_tag = classify(value);
    let payload = match value {
        RegValue::Text(s) => s.clone(),
        RegValue::Binary(bytes) => hex::encode_upper(bytes),
        RegValue::Int16(i) => i.to_string(),
        RegValue::Int32(i) => i.to_string(),
    };

    log::debug!("{}\\{} -> {} {:?}", entry.path(), entry.name, type_tag, payload);

    Ok(SerializedValue { type_tag, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hive;

    fn serialized(value: impl Into<RegValue>) -> (String, String) {
        let entry = RegistryEntry::new(Hive::LocalMachine, "Software\\Test", "Value", value);
        let out = serialize(&entry).unwrap();
        (out.type_tag.as_str().to_string(), out.payload)
    }

    #[test]
    fn test_string() {
        assert_eq!(serialized("Hello"), ("string".into(), "Hello".into()));
    }

    #[test]
    fn test_integer() {
        assert_eq!(serialized(777), ("integer".into(), "777".into()));
        assert_eq!(serialized(-12i16), ("integer".into(), "-12".into()));
    }

    #[test]
    fn test_multi_string() {
        assert_eq!(
            serialized("Line1\nLine2"),
            ("multiString".into(), "Line1\nLine2".into())
        );
    }

    #[test]
    fn test_expandable() {
        assert_eq!(
            serialized("%ProgramFiles%\\App"),
            ("expandable".into(), "%ProgramFiles%\\App".into())
        );
    }

    #[test]
    fn test_binary_is_upper_hex_without_separators() {
        assert_eq!(
            serialized(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            ("binary".into(), "DEADBEEF".into())
        );

        let bytes: Vec<u8> = (0..=255).collect();
        let (_, payload) = serialized(bytes.clone());
        assert_eq!(payload.len(), bytes.len() * 2);
        assert!(!payload.contains('-'));
        assert_eq!(payload, payload.to_uppercase());
        assert!(payload.starts_with("000102"));
        assert!(payload.ends_with("FEFF"));
    }

    #[test]
    fn test_empty_binary() {
        assert_eq!(serialized(Vec::<u8>::new()), ("binary".into(), String::new()));
    }

    #[test]
    fn test_unset_value_fails() {
        let entry = RegistryEntry::unset("Missing");
        match serialize(&entry) {
            Err(RegError::NullValue(name)) => assert_eq!(name, "Missing"),
            other => panic!("expected NullValue, got {:?}", other),
        }
    }
}
