// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Root selection and shared context for containers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::installer::{Installer, PipInstaller};
use crate::recipe::RecipeBook;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./settings_test.rs"]
mod settings_test;

/// Directory name of the default local root, under the home directory.
pub const DEFAULT_LOCAL_ROOT_DIRNAME: &str = ".rezup";

/// Explicit configuration threaded into container construction.
///
/// Nothing here is read from the process environment, the command line
/// layer is responsible for filling it in.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Local root override, `~/.rezup` when unset.
    pub local_root: Option<PathBuf>,
    /// Shared remote root. There is no default, unset means no remote.
    pub remote_root: Option<PathBuf>,
    /// Where container recipe files live, the home directory when unset.
    pub recipe_dir: Option<PathBuf>,
    /// Shell name or path that overrides shell detection.
    pub default_shell: Option<String>,
}

impl Settings {
    /// The local root, falling back to `~/.rezup`.
    pub fn local_root(&self) -> Result<PathBuf> {
        match &self.local_root {
            Some(root) => Ok(root.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(DEFAULT_LOCAL_ROOT_DIRNAME))
                .ok_or(Error::NoHomeDirectory),
        }
    }

    /// The configured remote root, if any.
    pub fn remote_root(&self) -> Option<&Path> {
        self.remote_root.as_deref()
    }

    /// Resolve the root a container named `name` lives in.
    ///
    /// Returns the root and whether it is the remote one. With `force_local`
    /// the local root is always picked, otherwise the remote root wins when
    /// configured.
    pub fn resolve_root(&self, name: &str, force_local: bool) -> Result<(PathBuf, bool)> {
        tracing::trace!(name, force_local, "resolving container root");
        if !force_local {
            if let Some(remote) = self.remote_root() {
                return Ok((remote.to_path_buf(), true));
            }
        }
        let local = self.local_root()?;
        let is_remote = self.is_remote_root(&local);
        Ok((local, is_remote))
    }

    /// Whether `root` is the configured remote root.
    pub fn is_remote_root(&self, root: &Path) -> bool {
        self.remote_root()
            .is_some_and(|remote| same_path(remote, root))
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Everything a container needs beyond its name: settings, recipe lookup
/// and the installer used to build local revisions.
pub struct Context {
    pub settings: Settings,
    pub recipes: RecipeBook,
    pub installer: Arc<dyn Installer>,
}

impl Context {
    /// Build a context with the default pip installer.
    pub fn new(settings: Settings) -> Result<Arc<Self>> {
        Self::with_installer(settings, Arc::new(PipInstaller::default()))
    }

    /// Build a context with a custom installer.
    pub fn with_installer(
        settings: Settings,
        installer: Arc<dyn Installer>,
    ) -> Result<Arc<Self>> {
        let recipe_dir = match &settings.recipe_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir().ok_or(Error::NoHomeDirectory)?,
        };
        Ok(Arc::new(Self {
            recipes: RecipeBook::new(recipe_dir),
            settings,
            installer,
        }))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .field("recipes", &self.recipes)
            .finish_non_exhaustive()
    }
}
