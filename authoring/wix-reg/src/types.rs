//! Registry entry value objects

use crate::{RegError, Result};
use serde::{Deserialize, Serialize};

/// Root of the registry namespace an entry is written under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hive {
    #[default]
    #[serde(rename = "HKCU", alias = "HKEY_CURRENT_USER", alias = "CurrentUser")]
    CurrentUser,
    #[serde(rename = "HKLM", alias = "HKEY_LOCAL_MACHINE", alias = "LocalMachine")]
    LocalMachine,
    #[serde(rename = "HKCR", alias = "HKEY_CLASSES_ROOT", alias = "ClassesRoot")]
    ClassesRoot,
    #[serde(rename = "HKU", alias = "HKEY_USERS", alias = "Users")]
    Users,
    #[serde(rename = "HKCC", alias = "HKEY_CURRENT_CONFIG", alias = "CurrentConfig")]
    CurrentConfig,
}

impl Hive {
    /// Short name as used in `.reg` abbreviations and manifests
    pub fn short_name(&self) -> &'static str {
        match self {
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
            Hive::ClassesRoot => "HKCR",
            Hive::Users => "HKU",
            Hive::CurrentConfig => "HKCC",
        }
    }

    /// Full name as written in `.reg` section headers
    pub fn long_name(&self) -> &'static str {
        match self {
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::Users => "HKEY_USERS",
            Hive::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Value of the WiX `Root` attribute.
    ///
    /// The installer registry table has no root for HKEY_CURRENT_CONFIG.
    pub fn wix_root(&self) -> Result<&'static str> {
        match self {
            Hive::CurrentConfig => Err(RegError::UnsupportedHive(*self)),
            other => Ok(other.short_name()),
        }
    }
}

impl std::fmt::Display for Hive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl std::str::FromStr for Hive {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HKCU" | "HKEY_CURRENT_USER" | "CURRENTUSER" => Ok(Hive::CurrentUser),
            "HKLM" | "HKEY_LOCAL_MACHINE" | "LOCALMACHINE" => Ok(Hive::LocalMachine),
            "HKCR" | "HKEY_CLASSES_ROOT" | "CLASSESROOT" => Ok(Hive::ClassesRoot),
            "HKU" | "HKEY_USERS" | "USERS" => Ok(Hive::Users),
            "HKCC" | "HKEY_CURRENT_CONFIG" | "CURRENTCONFIG" => Ok(Hive::CurrentConfig),
            _ => Err(format!("Unknown registry hive: {}", s)),
        }
    }
}

/// Payload of a registry entry.
///
/// Only these shapes can be written; anything else is rejected where an
/// untyped value enters the crate (see [`RegValue::from_yaml`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    Text(String),
    Binary(Vec<u8>),
    Int16(i16),
    Int32(i32),
}

impl From<&str> for RegValue {
    fn from(s: &str) -> Self {
        RegValue::Text(s.to_string())
    }
}

impl From<String> for RegValue {
    fn from(s: String) -> Self {
        RegValue::Text(s)
    }
}

impl From<Vec<u8>> for RegValue {
    fn from(bytes: Vec<u8>) -> Self {
        RegValue::Binary(bytes)
    }
}

impl From<&[u8]> for RegValue {
    fn from(bytes: &[u8]) -> Self {
        RegValue::Binary(bytes.to_vec())
    }
}

impl From<i16> for RegValue {
    fn from(n: i16) -> Self {
        RegValue::Int16(n)
    }
}

impl From<i32> for RegValue {
    fn from(n: i32) -> Self {
        RegValue::Int32(n)
    }
}

/// A registry value to be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Explicit identifier (generated from the name if not set)
    pub id: Option<String>,
    /// Registry hive
    pub hive: Hive,
    /// Key path under the hive
    pub key: String,
    /// Value name (empty for the key's default value)
    pub name: String,
    /// Value, `None` when not set
    pub value: Option<RegValue>,
    /// Feature the value is installed with
    pub feature: Option<String>,
    /// Install-time condition gating creation of the value
    pub condition: Option<String>,
    /// Write to the 64-bit registry view
    pub win64: bool,
}

impl RegistryEntry {
    /// Entry under `hive\key`
    pub fn new(
        hive: Hive,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<RegValue>,
    ) -> Self {
        Self::builder(name, value).hive(hive).key(key).build()
    }

    pub fn builder(name: impl Into<String>, value: impl Into<RegValue>) -> RegistryEntryBuilder {
        RegistryEntryBuilder {
            entry: RegistryEntry {
                value: Some(value.into()),
                ..Self::unset(name)
            },
        }
    }

    /// Entry with no value assigned yet
    pub fn unset(name: impl Into<String>) -> Self {
        RegistryEntry {
            id: None,
            hive: Hive::default(),
            key: String::new(),
            name: name.into(),
            value: None,
            feature: None,
            condition: None,
            win64: false,
        }
    }

    /// `HIVE\key` path, used in messages and listings
    pub fn path(&self) -> String {
        if self.key.is_empty() {
            self.hive.short_name().to_string()
        } else {
            format!("{}\\{}", self.hive.short_name(), self.key)
        }
    }
}

pub struct RegistryEntryBuilder {
    entry: RegistryEntry,
}

impl RegistryEntryBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.entry.id = Some(id.into());
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.entry.feature = Some(feature.into());
        self
    }

    pub fn hive(mut self, hive: Hive) -> Self {
        self.entry.hive = hive;
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.entry.key = key.into();
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.entry.condition = Some(condition.into());
        self
    }

    pub fn win64(mut self, win64: bool) -> Self {
        self.entry.win64 = win64;
        self
    }

    pub fn build(self) -> RegistryEntry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let entry = RegistryEntry::builder("Message", "Hello").build();
        assert_eq!(entry.hive, Hive::CurrentUser);
        assert_eq!(entry.key, "");
        assert_eq!(entry.id, None);
        assert_eq!(entry.feature, None);
        assert!(!entry.win64);
        assert_eq!(entry.value, Some(RegValue::Text("Hello".into())));
    }

    #[test]
    fn test_builder_sets_everything() {
        let entry = RegistryEntry::builder("Count", 777)
            .id("CountValue")
            .feature("Core")
            .hive(Hive::LocalMachine)
            .key("Software\\My Company")
            .condition("NOT Installed")
            .win64(true)
            .build();

        assert_eq!(entry.id.as_deref(), Some("CountValue"));
        assert_eq!(entry.feature.as_deref(), Some("Core"));
        assert_eq!(entry.hive, Hive::LocalMachine);
        assert_eq!(entry.key, "Software\\My Company");
        assert_eq!(entry.condition.as_deref(), Some("NOT Installed"));
        assert!(entry.win64);
        assert_eq!(entry.value, Some(RegValue::Int32(777)));
    }

    #[test]
    fn test_new() {
        let entry = RegistryEntry::new(Hive::ClassesRoot, ".myapp", "", "MyApp.Document");
        assert_eq!(entry.path(), "HKCR\\.myapp");
        assert_eq!(entry.name, "");
    }

    #[test]
    fn test_unset() {
        let entry = RegistryEntry::unset("Empty");
        assert!(entry.value.is_none());
        assert_eq!(entry.path(), "HKCU");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(RegValue::from(5i16), RegValue::Int16(5));
        assert_eq!(RegValue::from(vec![1u8, 2]), RegValue::Binary(vec![1, 2]));
        assert_eq!(RegValue::from(&[0xFFu8][..]), RegValue::Binary(vec![0xFF]));
        assert_eq!(RegValue::from(String::from("x")), RegValue::Text("x".into()));
    }

    #[test]
    fn test_hive_from_str() {
        assert_eq!("hklm".parse::<Hive>().unwrap(), Hive::LocalMachine);
        assert_eq!("HKEY_CURRENT_USER".parse::<Hive>().unwrap(), Hive::CurrentUser);
        assert_eq!("HKEY_USERS".parse::<Hive>().unwrap(), Hive::Users);
        assert_eq!("HKCC".parse::<Hive>().unwrap(), Hive::CurrentConfig);
        assert!("HKXX".parse::<Hive>().is_err());
    }

    #[test]
    fn test_wix_root() {
        assert_eq!(Hive::ClassesRoot.wix_root().unwrap(), "HKCR");
        assert!(matches!(
            Hive::CurrentConfig.wix_root(),
            Err(RegError::UnsupportedHive(Hive::CurrentConfig))
        ));
    }
}
