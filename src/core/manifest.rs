//! package.yaml loading and sanitizing
//!
//! The manifest is sanitized on a best-effort basis: unknown or mistyped
//! properties are dropped with a warning, while a missing id, a malformed
//! version or an unusable code entry are fatal.

use crate::{
    error::{BuilderError, Result},
    utils::fs::FileSystemUtils,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument};

/// File name of the manifest, both in the source tree and inside the archive
pub const MANIFEST_FILE: &str = "package.yaml";

/// Loader tag of code entries backed by a compiled shared library
pub const NATIVE_LOADER: &str = "native";

const MANIFEST_STRING_PROPERTIES: &[&str] = &["id", "name", "author", "version"];
const MANIFEST_OTHER_PROPERTIES: &[&str] = &["code", "dependencies"];

/// Every code entry property is string-typed.
const CODE_PROPERTIES: &[&str] = &["loader", "type", "path", "name"];

/// Accepted spellings for the loader tag, most preferred first
const LOADER_ALIASES: &[&str] = &["type", "loader"];

/// Accepted spellings for the artifact name, most preferred first
const NAME_ALIASES: &[&str] = &["name", "path"];

/// Sanitized contents of package.yaml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Package identifier
    pub id: String,
    /// Human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Dotted numeric version (`major[.minor[.patch]]`)
    pub version: String,
    /// Passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Value>,
    /// Loadable units, `None` when the section is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Vec<CodeEntry>>,
}

/// One loadable unit of a package, with aliases already resolved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeEntry {
    /// Artifact name or path
    pub name: String,
    /// Loader tag, e.g. `native`
    #[serde(rename = "type")]
    pub loader: String,
}

impl CodeEntry {
    /// Entry for a native library given its short name (`foo` for `libfoo.so`)
    pub fn native(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: NATIVE_LOADER.to_string(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.loader == NATIVE_LOADER
    }
}

impl Manifest {
    /// Names of declared code entries using the native loader
    pub fn native_libraries(&self) -> Vec<&str> {
        self.code
            .iter()
            .flatten()
            .filter(|entry| entry.is_native())
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Serialize back to YAML for inclusion in the package
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| BuilderError::manifest_with_source("Failed to serialize package.yaml", e))
    }
}

/// Non-fatal problem found while sanitizing the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestWarning {
    /// Property is not part of the schema and was removed
    UnrecognizedProperty(String),
    /// String-typed property held a non-numeric, non-string value and was removed
    NotAString(String),
}

impl fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedProperty(key) => {
                write!(f, "Property \"{key}\" is not recognized in {MANIFEST_FILE}")
            }
            Self::NotAString(key) => {
                write!(f, "Property \"{key}\" must be a string in {MANIFEST_FILE}")
            }
        }
    }
}

/// A validated manifest together with the warnings raised while sanitizing it
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub warnings: Vec<ManifestWarning>,
}

/// Reads package.yaml and turns it into a [`Manifest`]
pub struct ManifestLoader {
    /// Accepted version format
    re_version: Regex,
    fs_utils: FileSystemUtils,
}

impl ManifestLoader {
    /// Create a new manifest loader
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_version: Regex::new(r"^\d+(\.\d+(\.\d+)?)?$")
                .map_err(|e| BuilderError::config(format!("Failed to compile regex: {e}")))?,
            fs_utils: FileSystemUtils::new(),
        })
    }

    /// Load and validate the manifest at `path`
    #[instrument(skip(self))]
    pub fn load<P: AsRef<Path> + fmt::Debug>(&self, path: P) -> Result<LoadedManifest> {
        let path = path.as_ref();
        if !self.fs_utils.is_file(path) {
            return Err(BuilderError::missing_file(
                format!("{MANIFEST_FILE} not found in the source directory"),
                path,
            ));
        }

        let content = self
            .fs_utils
            .read_file_to_string(path)
            .map_err(|e| BuilderError::file_system("read", path, e))?;

        self.parse_str(&content)
    }

    /// Parse and validate manifest text
    pub fn parse_str(&self, content: &str) -> Result<LoadedManifest> {
        // Plain integers wider than 64 bits do not fit a YAML `Value` and fail here.
        let document: Value = serde_yaml::from_str(content).map_err(|e| {
            BuilderError::manifest_with_source(format!("Failed to parse {MANIFEST_FILE}"), e)
        })?;

        let Value::Mapping(mut root) = document else {
            return Err(BuilderError::manifest(format!(
                "Invalid {MANIFEST_FILE} (the top level must be a mapping)"
            )));
        };

        let mut warnings = Vec::new();
        sanitize_properties(
            &mut root,
            &[MANIFEST_STRING_PROPERTIES, MANIFEST_OTHER_PROPERTIES].concat(),
            MANIFEST_STRING_PROPERTIES,
            &mut warnings,
        );

        let id = string_property(&root, "id").ok_or_else(|| {
            BuilderError::manifest(format!("No package id specified in {MANIFEST_FILE}"))
        })?;

        let version = string_property(&root, "version")
            .filter(|version| self.re_version.is_match(version))
            .ok_or_else(|| {
                BuilderError::manifest(format!("Invalid package version in {MANIFEST_FILE}"))
            })?;

        let code = match root.get_mut("code") {
            None => None,
            Some(Value::Sequence(entries)) => Some(
                entries
                    .iter_mut()
                    .map(|entry| resolve_code_entry(entry, &mut warnings))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Some(_) => {
                return Err(BuilderError::manifest(format!(
                    "Invalid code property in {MANIFEST_FILE} (not a list)"
                )));
            }
        };

        let manifest = Manifest {
            id,
            name: string_property(&root, "name"),
            author: string_property(&root, "author"),
            version,
            dependencies: root.get("dependencies").cloned(),
            code,
        };

        debug!(
            "Parsed {}: id='{}', version='{}', {} warning(s)",
            MANIFEST_FILE,
            manifest.id,
            manifest.version,
            warnings.len()
        );

        Ok(LoadedManifest { manifest, warnings })
    }
}

/// Drop unknown properties, then coerce or drop non-string values of
/// string-typed properties.
fn sanitize_properties(
    map: &mut Mapping,
    recognized: &[&str],
    string_properties: &[&str],
    warnings: &mut Vec<ManifestWarning>,
) {
    map.retain(|key, _| {
        let known = key.as_str().is_some_and(|key| recognized.contains(&key));
        if !known {
            warnings.push(ManifestWarning::UnrecognizedProperty(key_name(key)));
        }
        known
    });

    map.retain(|key, value| {
        let Some(key) = key.as_str() else {
            return true;
        };
        if !string_properties.contains(&key) {
            return true;
        }
        match value {
            Value::String(_) => true,
            Value::Number(number) => {
                *value = Value::String(number.to_string());
                true
            }
            _ => {
                warnings.push(ManifestWarning::NotAString(key.to_string()));
                false
            }
        }
    });
}

/// Sanitize one code entry and collapse its aliased fields
fn resolve_code_entry(entry: &mut Value, warnings: &mut Vec<ManifestWarning>) -> Result<CodeEntry> {
    let Value::Mapping(map) = entry else {
        return Err(BuilderError::manifest(format!(
            "Invalid code entry in {MANIFEST_FILE} (not a mapping)"
        )));
    };

    sanitize_properties(map, CODE_PROPERTIES, CODE_PROPERTIES, warnings);

    match (resolve_alias(map, LOADER_ALIASES), resolve_alias(map, NAME_ALIASES)) {
        (Some(loader), Some(name)) if !loader.is_empty() && !name.is_empty() => {
            Ok(CodeEntry { name, loader })
        }
        _ => Err(BuilderError::manifest(format!(
            "Invalid code entry in {MANIFEST_FILE} (no loader name or file path)"
        ))),
    }
}

/// Value of the first alias present in `map`
fn resolve_alias(map: &Mapping, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| map.get(*alias))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn string_property(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => format!("{other:?}"),
    }
}
