//! WiX v4 fragment generation

use crate::classify::TypeTag;
use crate::manifest::{parse_registry_path, Manifest, DEFAULT_FEATURE};
use crate::serialize::serialize;
use crate::types::RegistryEntry;
use crate::{RegError, Result};
use std::collections::HashSet;
use std::path::Path;

const MAX_ID_LEN: usize = 72;

/// Renders a manifest as a `<Fragment>` holding one component per
/// registry value, the features referencing them, registry-search
/// properties and launch conditions.
pub struct FragmentGenerator<'a> {
    manifest: &'a Manifest,
    base_path: Option<&'a Path>,
}

impl<'a> FragmentGenerator<'a> {
    pub fn new(manifest: &'a Manifest, base_path: Option<&'a Path>) -> Self {
        Self { manifest, base_path }
    }

    pub fn generate(&self) -> Result<String> {
        let entries = self.manifest.entries(self.base_path)?;
        self.generate_entries(&entries)
    }

    /// Generate for `entries` instead of the manifest's own
    pub fn generate_entries(&self, entries: &[RegistryEntry]) -> Result<String> {
        let mut xml = String::new();

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<!--\n");
        xml.push_str("  Generated by wix-reg\n");
        xml.push_str("-->\n");
        xml.push_str("<Wix xmlns=\"http://wixtoolset.org/schemas/v4/wxs\">\n");
        xml.push_str("  <Fragment>\n\n");

        xml.push_str(&self.generate_properties()?);
        xml.push_str(&self.generate_launch_conditions());

        let (components, refs) = self.generate_components(entries)?;
        xml.push_str(&components);
        xml.push_str(&self.generate_features(&refs));

        xml.push_str("  </Fragment>\n");
        xml.push_str("</Wix>\n");

        Ok(xml)
    }

    fn generate_properties(&self) -> Result<String> {
        let mut xml = String::new();
        if self.manifest.properties.is_empty() {
            return Ok(xml);
        }

        xml.push_str("    <!-- Registry Properties -->\n");
        for property in &self.manifest.properties {
            let (hive, key) = parse_registry_path(&property.key)?;

            xml.push_str(&format!("    <Property Id=\"{}\"", escape_xml(&property.id)));
            if let Some(ref value) = property.value {
                xml.push_str(&format!(" Value=\"{}\"", escape_xml(value)));
            }
            xml.push_str(">\n");

            xml.push_str(&format!(
                "      <RegistrySearch Id=\"{}_Search\" Root=\"{}\" Key=\"{}\"",
                sanitize_id(&property.id),
                hive.wix_root()?,
                escape_xml(&key)
            ));
            if !property.name.is_empty() {
                xml.push_str(&format!(" Name=\"{}\"", escape_xml(&property.name)));
            }
            xml.push_str(" Type=\"raw\"");
            if property.win64 {
                xml.push_str(" Bitness=\"always64\"");
            }
            xml.push_str(" />\n");
            xml.push_str("    </Property>\n");
        }
        xml.push('\n');

        Ok(xml)
    }

    fn generate_launch_conditions(&self) -> String {
        let mut xml = String::new();
        if self.manifest.launch_conditions.is_empty() {
            return xml;
        }

        xml.push_str("    <!-- Launch Conditions -->\n");
        for launch in &self.manifest.launch_conditions {
            xml.push_str(&format!(
                "    <Launch Condition=\"{}\" Message=\"{}\" />\n",
                escape_xml(&launch.condition),
                escape_xml(&launch.message)
            ));
        }
        xml.push('\n');

        xml
    }

    /// Components XML plus `(component id, feature id)` for each entry
    fn generate_components(
        &self,
        entries: &[RegistryEntry],
    ) -> Result<(String, Vec<(String, String)>)> {
        let mut xml = String::new();
        let mut refs = Vec::new();
        let mut used_ids = HashSet::new();

        xml.push_str("    <!-- Registry Values -->\n");
        xml.push_str(&format!(
            "    <ComponentGroup Id=\"{}\" Directory=\"{}\">\n",
            escape_xml(&self.manifest.fragment),
            escape_xml(&self.manifest.directory)
        ));

        for entry in entries {
            let value = serialize(entry)?;
            let root = entry.hive.wix_root()?;

            let value_id = unique_id(entry, &mut used_ids)?;
            let comp_id = format!("Component_{}", value_id);

            xml.push_str(&format!("      <Component Id=\"{}\" Guid=\"*\"", comp_id));
            if let Some(ref condition) = entry.condition {
                xml.push_str(&format!(" Condition=\"{}\"", escape_xml(condition)));
            }
            if entry.win64 {
                xml.push_str(" Bitness=\"always64\"");
            }
            xml.push_str(">\n");

            xml.push_str(&format!(
                "        <RegistryValue Id=\"{}\" Root=\"{}\" Key=\"{}\"",
                value_id,
                root,
                escape_xml(&entry.key)
            ));
            if !entry.name.is_empty() {
                xml.push_str(&format!(" Name=\"{}\"", escape_xml(&entry.name)));
            }
            xml.push_str(&format!(" Type=\"{}\"", value.type_tag));

            if value.type_tag == TypeTag::MultiString {
                xml.push_str(" KeyPath=\"yes\">\n");
                let payload = value.payload.strip_suffix('\n').unwrap_or(&value.payload);
                for line in payload.split('\n') {
                    xml.push_str(&format!(
                        "          <MultiStringValue Value=\"{}\" />\n",
                        escape_xml(line.trim_end_matches('\r'))
                    ));
                }
                xml.push_str("        </RegistryValue>\n");
            } else {
                xml.push_str(&format!(
                    " Value=\"{}\" KeyPath=\"yes\" />\n",
                    escape_xml(&value.payload)
                ));
            }

            xml.push_str("      </Component>\n");

            let feature = entry.feature.clone().unwrap_or_else(|| DEFAULT_FEATURE.to_string());
            refs.push((comp_id, feature));
        }

        xml.push_str("    </ComponentGroup>\n\n");
        Ok((xml, refs))
    }

    fn generate_features(&self, refs: &[(String, String)]) -> String {
        let mut xml = String::new();
        xml.push_str("    <!-- Features -->\n");

        let declared: HashSet<&str> = self.manifest.features.iter().map(|f| f.id.as_str()).collect();

        for feature in &self.manifest.features {
            xml.push_str(&format!("    <Feature Id=\"{}\"", escape_xml(&feature.id)));
            if !feature.title.is_empty() {
                xml.push_str(&format!(" Title=\"{}\"", escape_xml(&feature.title)));
            }
            if !feature.description.is_empty() {
                xml.push_str(&format!(" Description=\"{}\"", escape_xml(&feature.description)));
            }
            xml.push_str(&format!(" Level=\"{}\">\n", feature.level));
            xml.push_str(&component_refs(refs, &feature.id));
            xml.push_str("    </Feature>\n");
        }

        let needs_default = !declared.contains(DEFAULT_FEATURE)
            && refs.iter().any(|(_, feature)| feature == DEFAULT_FEATURE);
        if needs_default {
            xml.push_str(&format!(
                "    <Feature Id=\"{0}\" Title=\"{0}\" Level=\"1\">\n",
                DEFAULT_FEATURE
            ));
            xml.push_str(&component_refs(refs, DEFAULT_FEATURE));
            xml.push_str("    </Feature>\n");
        }

        xml.push('\n');
        xml
    }
}

/// Explicit id, or one derived from the value name and made unique.
/// Explicit ids must already be valid and unused.
fn unique_id(entry: &RegistryEntry, used: &mut HashSet<String>) -> Result<String> {
    if let Some(ref id) = entry.id {
        if !is_valid_id(id) {
            return Err(RegError::ConfigError(format!(
                "'{}' is not a valid WiX identifier",
                id
            )));
        }
        if !used.insert(id.clone()) {
            return Err(RegError::ConfigError(format!("Duplicate value id '{}'", id)));
        }
        return Ok(id.clone());
    }

    let base = if entry.name.is_empty() {
        "RegValue_Default".to_string()
    } else {
        format!("RegValue_{}", sanitize_id(&entry.name))
    };

    let mut id = base.clone();
    let mut n = 1;
    while used.contains(&id) {
        n += 1;
        id = format!("{}_{}", base, n);
    }
    used.insert(id.clone());
    Ok(id)
}

/// Letter or underscore first, then letters, digits, `_` or `.`; at most 72 chars
fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    let first_ok = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    first_ok
        && id.len() <= MAX_ID_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn component_refs(refs: &[(String, String)], feature: &str) -> String {
    refs.iter()
        .filter(|(_, f)| f == feature)
        .map(|(comp_id, _)| format!("      <ComponentRef Id=\"{}\" />\n", comp_id))
        .collect()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn sanitize_id(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
