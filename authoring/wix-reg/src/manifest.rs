//! YAML manifest describing the registry content of an installer

use crate::regfile::RegFile;
use crate::types::{Hive, RegValue, RegistryEntry};
use crate::wxs::FragmentGenerator;
use crate::{RegError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Feature that registry entries without one are installed with
pub const DEFAULT_FEATURE: &str = "Complete";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// ComponentGroup id of the generated fragment
    #[serde(default = "default_fragment")]
    pub fragment: String,

    /// Directory the registry components are attached to
    #[serde(default = "default_directory")]
    pub directory: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<FeatureDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registry: Vec<RegistryDef>,

    /// `.reg` files to import (glob patterns, relative to the manifest)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reg_files: Vec<RegFileDef>,

    /// Properties set from existing registry values at install time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub launch_conditions: Vec<LaunchConditionDef>,
}

fn default_fragment() -> String {
    "RegistryComponents".to_string()
}

fn default_directory() -> String {
    "INSTALLFOLDER".to_string()
}

fn default_level() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDef {
    pub id: String,

    /// Feature title (shown in UI)
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Install level (1 = default install, 0 = hidden)
    #[serde(default = "default_level")]
    pub level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryDef {
    /// Key path with its hive (e.g., "HKLM/Software/MyCompany/MyApp")
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub win64: bool,

    /// Values by name; "@" or "" is the key's default value. A value may
    /// also be written as `{ value: ..., id: ..., condition: ... }`.
    #[serde(default)]
    pub values: Mapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegFileDef {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub win64: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property id (uppercase to be public)
    pub id: String,

    /// Key path with its hive
    pub key: String,

    /// Value name to read
    #[serde(default)]
    pub name: String,

    /// Value used when the registry value is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub win64: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConditionDef {
    pub condition: String,
    pub message: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            fragment: default_fragment(),
            directory: default_directory(),
            features: Vec::new(),
            registry: Vec::new(),
            reg_files: Vec::new(),
            properties: Vec::new(),
            launch_conditions: Vec::new(),
        }
    }
}

impl Manifest {
    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check ids and feature references. Values are checked when entries
    /// are built.
    pub fn validate(&self) -> Result<()> {
        if self.fragment.is_empty() {
            return Err(RegError::MissingField("fragment".into()));
        }
        if self.directory.is_empty() {
            return Err(RegError::MissingField("directory".into()));
        }

        let mut feature_ids = HashSet::new();
        for feature in &self.features {
            if feature.id.is_empty() {
                return Err(RegError::MissingField("features.id".into()));
            }
            if !feature_ids.insert(feature.id.as_str()) {
                return Err(RegError::ConfigError(format!(
                    "duplicate feature id: {}",
                    feature.id
                )));
            }
        }

        let referenced = self
            .registry
            .iter()
            .filter_map(|r| r.feature.as_deref())
            .chain(self.reg_files.iter().filter_map(|r| r.feature.as_deref()));
        for feature in referenced {
            if feature != DEFAULT_FEATURE && !feature_ids.contains(feature) {
                return Err(RegError::UnknownFeature(feature.to_string()));
            }
        }

        for reg in &self.registry {
            if reg.key.is_empty() {
                return Err(RegError::MissingField("registry.key".into()));
            }
        }
        for reg_file in &self.reg_files {
            if reg_file.path.is_empty() {
                return Err(RegError::MissingField("reg_files.path".into()));
            }
        }

        let mut property_ids = HashSet::new();
        for property in &self.properties {
            if property.id.is_empty() {
                return Err(RegError::MissingField("properties.id".into()));
            }
            if property.key.is_empty() {
                return Err(RegError::MissingField("properties.key".into()));
            }
            if !property_ids.insert(property.id.as_str()) {
                return Err(RegError::ConfigError(format!(
                    "duplicate property id: {}",
                    property.id
                )));
            }
        }

        for launch in &self.launch_conditions {
            if launch.condition.is_empty() {
                return Err(RegError::MissingField("launch_conditions.condition".into()));
            }
            if launch.message.is_empty() {
                return Err(RegError::MissingField("launch_conditions.message".into()));
            }
        }

        Ok(())
    }

    /// All registry entries: inline values first, then imported `.reg`
    /// files in pattern order.
    pub fn entries(&self, base_path: Option<&Path>) -> Result<Vec<RegistryEntry>> {
        let mut entries = Vec::new();

        for reg in &self.registry {
            let (hive, key) = parse_registry_path(&reg.key)?;

            for (name, raw) in &reg.values {
                let name = value_name(name)?;
                let (raw, id, condition) = split_detailed(raw)?;

                let mut entry = RegistryEntry::unset(name);
                entry.value = RegValue::from_yaml(raw)?;
                entry.hive = hive;
                entry.key = key.clone();
                entry.id = id;
                entry.feature = reg.feature.clone();
                entry.condition = condition.or_else(|| reg.condition.clone());
                entry.win64 = reg.win64;
                entries.push(entry);
            }
        }

        for reg_file in &self.reg_files {
            for path in expand_glob(base_path, &reg_file.path)? {
                for mut entry in RegFile::load(&path)? {
                    entry.feature = reg_file.feature.clone();
                    entry.condition = reg_file.condition.clone();
                    entry.win64 = reg_file.win64;
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }

    /// Build a manifest holding `entries`, grouping consecutive values of
    /// the same key.
    pub fn from_entries(entries: &[RegistryEntry], feature: Option<&str>) -> Self {
        let mut registry: Vec<RegistryDef> = Vec::new();

        for entry in entries {
            let key = if entry.key.is_empty() {
                entry.hive.short_name().to_string()
            } else {
                format!("{}\\{}", entry.hive.short_name(), entry.key)
            };

            let starts_new = registry
                .last()
                .map_or(true, |r| r.key != key || r.win64 != entry.win64);
            if starts_new {
                registry.push(RegistryDef {
                    key,
                    feature: feature.map(str::to_string),
                    condition: None,
                    win64: entry.win64,
                    values: Mapping::new(),
                });
            }

            let name = if entry.name.is_empty() { "@" } else { entry.name.as_str() };
            let value = entry.value.as_ref().map(RegValue::to_yaml).unwrap_or(Value::Null);
            if let Some(last) = registry.last_mut() {
                last.values.insert(Value::String(name.to_string()), value);
            }
        }

        let features = feature
            .map(|id| {
                vec![FeatureDef {
                    id: id.to_string(),
                    title: id.to_string(),
                    description: String::new(),
                    level: 1,
                }]
            })
            .unwrap_or_default();

        Manifest {
            features,
            registry,
            ..Default::default()
        }
    }

    /// Generate the WiX fragment
    pub fn generate_wix(&self, base_path: Option<&Path>) -> Result<String> {
        let generator = FragmentGenerator::new(self, base_path);
        generator.generate()
    }
}

/// Split "HKLM/Software/MyApp" into its hive and a backslash-separated
/// key. A path without a recognised hive prefix is under HKCU.
pub fn parse_registry_path(path: &str) -> Result<(Hive, String)> {
    let path = path.replace('/', "\\");
    let (first, rest) = path.split_once('\\').unwrap_or((path.as_str(), ""));

    match first.parse::<Hive>() {
        Ok(hive) => Ok((hive, rest.trim_matches('\\').to_string())),
        Err(_) if first.to_uppercase().starts_with("HK") => Err(RegError::ConfigError(format!(
            "unknown registry hive in key: {}",
            first
        ))),
        Err(_) => Ok((Hive::CurrentUser, path.trim_matches('\\').to_string())),
    }
}

fn value_name(name: &Value) -> Result<String> {
    match name {
        Value::String(s) if s == "@" => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(RegError::ConfigError(format!(
            "invalid registry value name: {:?}",
            other
        ))),
    }
}

type Detailed<'a> = (&'a Value, Option<String>, Option<String>);

/// Unpack `{ value: ..., id: ..., condition: ... }`
fn split_detailed(raw: &Value) -> Result<Detailed<'_>> {
    let map = match raw {
        Value::Mapping(map) if map.contains_key("value") => map,
        _ => return Ok((raw, None, None)),
    };

    let mut id = None;
    let mut condition = None;
    for (k, v) in map {
        match (k.as_str(), v.as_str()) {
            (Some("value"), _) => {}
            (Some("id"), Some(s)) => id = Some(s.to_string()),
            (Some("condition"), Some(s)) => condition = Some(s.to_string()),
            _ => {
                return Err(RegError::ConfigError(format!(
                    "unexpected field in registry value: {:?}",
                    k
                )))
            }
        }
    }

    let value = map.get("value").unwrap_or(&Value::Null);
    Ok((value, id, condition))
}

fn expand_glob(base_path: Option<&Path>, pattern: &str) -> Result<Vec<PathBuf>> {
    let resolved = match base_path {
        Some(base) => base.join(pattern),
        None => PathBuf::from(pattern),
    };
    let pattern_str = resolved.to_string_lossy();

    let mut paths: Vec<PathBuf> = glob::glob(&pattern_str)?.filter_map(|p| p.ok()).collect();
    if paths.is_empty() {
        return Err(RegError::ConfigError(format!(
            "no .reg files match {}",
            pattern_str
        )));
    }
    paths.sort();
    Ok(paths)
}
