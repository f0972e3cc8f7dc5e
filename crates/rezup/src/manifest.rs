// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Manifest data types, the recipe snapshot bound to each revision.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./manifest_test.rs"]
mod manifest_test;

/// One installable tool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Tool {
    /// Distribution name, also the name of its sub-environment.
    pub name: String,

    /// Anything pip accepts: a requirement, an archive url or a local path.
    pub url: String,

    /// Install in editable (development) mode.
    #[serde(default)]
    pub edit: bool,

    /// Install into its own sub-environment instead of the primary one.
    #[serde(default)]
    pub isolation: bool,

    /// Interpreter override for an isolated sub-environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
}

/// Requirements installed once per container and shared by its revisions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SharedLib {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

/// Dotenv file references.
///
/// Either a single path, a list of paths, or a table whose keys order the
/// files. Keys naming a platform (`linux`, `macos`/`darwin`, `windows`) only
/// apply on that platform and are layered after the common ones.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Dotenv {
    File(String),
    Files(Vec<String>),
    Keyed(BTreeMap<String, String>),
}

const PLATFORM_KEYS: &[&str] = &["linux", "macos", "darwin", "windows"];

fn is_current_platform(key: &str) -> bool {
    match key {
        "linux" => cfg!(target_os = "linux"),
        "macos" | "darwin" => cfg!(target_os = "macos"),
        "windows" => cfg!(windows),
        _ => false,
    }
}

impl Dotenv {
    /// File references in the order they should be applied on this platform.
    pub fn files(&self) -> Vec<&str> {
        match self {
            Dotenv::File(file) => vec![file.as_str()],
            Dotenv::Files(files) => files.iter().map(String::as_str).collect(),
            Dotenv::Keyed(table) => {
                let common = table
                    .iter()
                    .filter(|(key, _)| !PLATFORM_KEYS.contains(&key.as_str()))
                    .map(|(_, file)| file.as_str());
                let platform = table
                    .iter()
                    .filter(|(key, _)| is_current_platform(key))
                    .map(|(_, file)| file.as_str());
                common.chain(platform).collect()
            }
        }
    }
}

/// The declarative description of a revision.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Manifest {
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Dotenv files loaded before the inline environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotenv: Option<Dotenv>,

    /// Inline environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// The primary tool.
    pub rez: Tool,

    /// Extension tools, installed after the primary tool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Tool>,

    /// Shared library requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<SharedLib>,
}

impl Manifest {
    /// Parse a manifest from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> crate::Result<Self> {
        toml::from_str(text).map_err(|error| crate::Error::InvalidRecipe {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Load a manifest from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml(&text, path)
    }

    /// Serialize to TOML text.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// All tools, primary first.
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        std::iter::once(&self.rez).chain(self.extension.iter())
    }

    /// Names of the sub-environments installing this manifest produces: the
    /// primary tool and every isolated extension.
    pub fn venv_names(&self) -> Vec<String> {
        self.tools()
            .enumerate()
            .filter(|(i, tool)| *i == 0 || tool.isolation)
            .map(|(_, tool)| tool.name.clone())
            .collect()
    }

    /// Check the manifest can be installed.
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = HashSet::new();
        for tool in self.tools() {
            if tool.name.trim().is_empty() {
                return Err(crate::Error::ValidationFailed(
                    "tool name must not be empty".to_string(),
                ));
            }
            if tool.url.trim().is_empty() {
                return Err(crate::Error::ValidationFailed(format!(
                    "tool '{}' has no url",
                    tool.name
                )));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(crate::Error::ValidationFailed(format!(
                    "tool '{}' is declared more than once",
                    tool.name
                )));
            }
        }
        Ok(())
    }
}
