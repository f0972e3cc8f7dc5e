// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Container recipe lookup and layering over the default recipe.

use std::path::{Path, PathBuf};

use crate::{Error, Manifest, Result};

#[cfg(test)]
#[path = "./recipe_test.rs"]
mod recipe_test;

/// Name of the container used when none is given.
pub const DEFAULT_CONTAINER_NAME: &str = ".main";

/// The recipe every user recipe is layered over.
pub const DEFAULT_RECIPE: &str = include_str!("./rezup.toml");

const RECIPE_PREFIX: &str = "rezup";
const RECIPE_EXTENSION: &str = "toml";

/// Recipe files of all containers, kept in one directory.
///
/// The default container `.main` reads `rezup.toml`, any other container
/// `foo` reads `rezup.foo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeBook {
    dir: PathBuf,
}

impl RecipeBook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of the recipe for container `name`.
    pub fn file_name(name: &str) -> String {
        if name.is_empty() || name == DEFAULT_CONTAINER_NAME {
            format!("{RECIPE_PREFIX}.{RECIPE_EXTENSION}")
        } else {
            format!("{RECIPE_PREFIX}.{name}.{RECIPE_EXTENSION}")
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(Self::file_name(name))
    }

    /// The current recipe of container `name`, layered over the default.
    pub fn load(&self, name: &str) -> Result<Manifest> {
        let mut table = default_table()?;
        let path = self.path_for(name);
        if path.is_file() {
            tracing::debug!("loading recipe {}", path.display());
            let text = std::fs::read_to_string(&path).map_err(|error| Error::ReadFailed {
                path: path.clone(),
                error,
            })?;
            let user: toml::Table = toml::from_str(&text).map_err(|error| {
                Error::InvalidRecipe {
                    path: path.clone(),
                    error,
                }
            })?;
            deep_update(&mut table, user);
        }

        toml::Value::Table(table)
            .try_into()
            .map_err(|error| Error::InvalidRecipe { path, error })
    }

    /// Names of containers that have a recipe file.
    pub fn iter_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.dir.is_dir() {
            return Ok(names);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str().and_then(container_name_of) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Write the default recipe for container `name`, keeping comments.
    ///
    /// Returns the path of the new recipe file.
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        let path = self.path_for(name);
        if path.exists() {
            return Err(Error::ValidationFailed(format!(
                "recipe already exists at {}",
                path.display()
            )));
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, DEFAULT_RECIPE).map_err(|error| Error::WriteFailed {
            path: path.clone(),
            error,
        })?;
        Ok(path)
    }
}

fn default_table() -> Result<toml::Table> {
    toml::from_str(DEFAULT_RECIPE).map_err(|error| Error::InvalidRecipe {
        path: PathBuf::from("<default recipe>"),
        error,
    })
}

fn container_name_of(file_name: &str) -> Option<String> {
    let stem = file_name
        .strip_prefix(RECIPE_PREFIX)?
        .strip_suffix(RECIPE_EXTENSION)?
        .strip_suffix('.')?;
    if stem.is_empty() {
        return Some(DEFAULT_CONTAINER_NAME.to_string());
    }
    let name = stem.strip_prefix('.')?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Merge `overlay` into `base`. Tables merge recursively, anything else is
/// replaced.
pub fn deep_update(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    deep_update(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
