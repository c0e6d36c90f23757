//! wix-reg - Typed registry value authoring for WiX
//!
//! Describe registry values once, get the WiX `RegistryValue` type and
//! payload the compiler expects.
//!
//! # Example
//!
//! ```
//! use wix_reg::{serialize, Hive, RegistryEntry};
//!
//! let entry = RegistryEntry::builder("Count", 777)
//!     .hive(Hive::LocalMachine)
//!     .key("Software\\My Company\\My Product")
//!     .build();
//!
//! let out = serialize(&entry).unwrap();
//! assert_eq!(out.type_tag.as_str(), "integer");
//! assert_eq!(out.payload, "777");
//! ```
//!
//! # Example YAML
//!
//! ```yaml
//! features:
//!   - id: Core
//!     title: Core files
//!
//! registry:
//!   - key: HKLM/Software/My Company/My Product
//!     feature: Core
//!     values:
//!       Message: Hello
//!       Count: 777
//!       Blob: { binary: "DEADBEEF" }
//!
//! reg_files:
//!   - path: ./settings/*.reg
//! ```

pub mod classify;
pub mod manifest;
pub mod regfile;
pub mod serialize;
pub mod types;
pub mod wxs;

pub use classify::{classify, TypeTag};
pub use manifest::Manifest;
pub use regfile::{parse_reg, RegFile};
pub use serialize::{serialize, SerializedValue};
pub use types::{Hive, RegValue, RegistryEntry, RegistryEntryBuilder};
pub use wxs::FragmentGenerator;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegError {
    #[error("Unsupported registry value type: {0}")]
    UnsupportedValueType(String),

    #[error("Registry value '{0}' has no value set")]
    NullValue(String),

    #[error("Hive {0} cannot be written by an installer")]
    UnsupportedHive(Hive),

    #[error("Invalid binary value: {0}")]
    InvalidBinary(#[from] hex::FromHexError),

    #[error("Invalid .reg content at line {line}: {message}")]
    RegSyntax { line: usize, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid file pattern: {0}")]
    PatternError(#[from] glob::PatternError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),
}

pub type Result<T> = std::result::Result<T, RegError>;
