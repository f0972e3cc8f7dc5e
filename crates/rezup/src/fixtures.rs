// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Shared test fixtures: temporary roots and a recording installer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rstest::fixture;
use tempfile::TempDir;

use crate::installer::{venv_bin_dir, Installer, PRODUCTION_BIN_DIRNAME, VENV_DIRNAME};
use crate::{Context, Error, Manifest, Result, Revision, Settings};

/// Stands in for the package installer, remembering what it was asked to
/// install and creating empty sub-environments plus one production script.
#[derive(Debug, Default)]
pub struct RecordingInstaller {
    calls: Mutex<Vec<(PathBuf, Manifest)>>,
    fail: AtomicBool,
}

impl RecordingInstaller {
    pub fn calls(&self) -> Vec<(PathBuf, Manifest)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Installer for RecordingInstaller {
    fn install(&self, revision: &Revision, manifest: &Manifest) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((revision.path().to_path_buf(), manifest.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::InstallFailed {
                tool: manifest.rez.name.clone(),
                command: "fake install".to_string(),
                code: Some(1),
            });
        }
        for name in manifest.venv_names() {
            let bin = venv_bin_dir(&revision.path().join(VENV_DIRNAME).join(name));
            std::fs::create_dir_all(bin)?;
        }
        let bin = revision.path().join(PRODUCTION_BIN_DIRNAME);
        std::fs::create_dir_all(&bin)?;
        std::fs::write(bin.join(&manifest.rez.name), "#!/bin/sh\n")?;
        Ok(())
    }
}

/// A temporary local root, remote root and recipe directory.
pub struct TestRoots {
    pub tmp: TempDir,
    pub installer: Arc<RecordingInstaller>,
    pub context: Arc<Context>,
}

impl TestRoots {
    pub fn new(with_remote: bool) -> Self {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            local_root: Some(tmp.path().join("local")),
            remote_root: with_remote.then(|| tmp.path().join("remote")),
            recipe_dir: Some(tmp.path().join("recipes")),
            default_shell: None,
        };
        let installer = Arc::new(RecordingInstaller::default());
        let context = Context::with_installer(settings, installer.clone()).unwrap();
        Self {
            tmp,
            installer,
            context,
        }
    }

    pub fn local_root(&self) -> PathBuf {
        self.tmp.path().join("local")
    }

    pub fn remote_root(&self) -> PathBuf {
        self.tmp.path().join("remote")
    }

    pub fn recipe_dir(&self) -> &Path {
        self.context.recipes.dir()
    }

    /// Write the recipe file of container `name`.
    pub fn write_recipe(&self, name: &str, text: &str) {
        let path = self.context.recipes.path_for(name);
        std::fs::create_dir_all(self.recipe_dir()).unwrap();
        std::fs::write(path, text).unwrap();
    }
}

/// Recipe with a fixture primary tool and the given description.
pub fn fixture_recipe(description: &str) -> String {
    format!(
        "description = \"{description}\"\n\n[rez]\nname = \"rez\"\nurl = \"/fixtures/rez\"\n"
    )
}

#[fixture]
pub fn local_only() -> TestRoots {
    TestRoots::new(false)
}

#[fixture]
pub fn roots() -> TestRoots {
    TestRoots::new(true)
}
