// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Timestamp-identified environment instances.
//!
//! A revision directory goes through three observable states:
//!
//! 1. created: the directory and its `revision.json` exist
//! 2. installing: local revisions only, the installer builds `venv/`
//! 3. ready: the `rezup.toml` manifest snapshot exists
//!
//! The snapshot is always written last, so readers that only look at ready
//! revisions never see one that is still being built.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use once_cell::sync::OnceCell;

use crate::container::Container;
use crate::installer::PRODUCTION_BIN_DIRNAME;
use crate::launch::{LaunchTarget, Launcher};
use crate::metadata::RevisionMetadata;
use crate::shell::Shell;
use crate::{dotenv, Error, Manifest, Result};

#[cfg(test)]
#[path = "./revision_test.rs"]
mod revision_test;

pub const METADATA_FILENAME: &str = "revision.json";
pub const MANIFEST_FILENAME: &str = "rezup.toml";

/// Reserved variable naming the container in use.
pub const CONTAINER_ENV_VAR: &str = "REZUP_CONTAINER";
/// Reserved variable set to `1` when the revision came from the remote root.
pub const USING_REMOTE_ENV_VAR: &str = "REZUP_USING_REMOTE";

const PROMPT_DATE_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Parse a revision directory name into its timestamp in seconds.
pub fn parse_dirname(dirname: &str) -> Option<f64> {
    dirname.parse::<f64>().ok().filter(|ts| ts.is_finite())
}

/// Format a timestamp in microseconds as a revision directory name.
pub fn format_dirname(micros: i64) -> String {
    format!(
        "{}.{:06}",
        micros.div_euclid(1_000_000),
        micros.rem_euclid(1_000_000)
    )
}

/// How a new revision gets named and recorded.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Exact directory name to use, a fresh "now" name when unset.
    pub dirname: Option<String>,
    /// The remote revision being materialized, if any.
    pub pulled_from: Option<PathBuf>,
}

/// How to enter a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseOptions {
    /// Block until a command or script finishes.
    pub wait: bool,
    /// Allow materializing a remote revision locally.
    pub pull: bool,
}

impl Default for UseOptions {
    fn default() -> Self {
        Self {
            wait: true,
            pull: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Revision {
    container: Container,
    dirname: String,
    path: PathBuf,
    valid: OnceCell<bool>,
}

impl Revision {
    /// Refer to a revision directory, which may or may not exist.
    pub fn new(container: Container, dirname: impl Into<String>) -> Self {
        let dirname = dirname.into();
        let path = container.revisions_path().join(&dirname);
        Self {
            container,
            dirname,
            path,
            valid: OnceCell::new(),
        }
    }

    /// Create a revision in `container` from `manifest`.
    ///
    /// The directory and metadata are written first, then local revisions
    /// are installed, then the manifest snapshot is persisted, which makes
    /// the revision ready. An installer error is returned as-is and leaves
    /// the revision not ready. Creating it again under the same exact
    /// dirname discards the unfinished content and rebuilds it.
    pub fn create(
        container: &Container,
        manifest: &Manifest,
        options: CreateOptions,
    ) -> Result<Self> {
        manifest.validate()?;

        let revisions = container.revisions_path();
        std::fs::create_dir_all(&revisions).map_err(|error| Error::WriteFailed {
            path: revisions.clone(),
            error,
        })?;

        let dirname = match options.dirname {
            Some(dirname) => {
                let path = revisions.join(&dirname);
                match std::fs::create_dir(&path) {
                    Ok(()) => dirname,
                    Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                        reclaim_unpublished(&path)?;
                        dirname
                    }
                    Err(error) => return Err(Error::WriteFailed { path, error }),
                }
            }
            None => allocate_dirname(&revisions)?,
        };

        let revision = Self::new(container.clone(), dirname);
        tracing::info!(
            "creating revision {} of {}",
            revision.dirname,
            container.name()
        );

        let revision_path =
            std::path::absolute(&revision.path).unwrap_or_else(|_| revision.path.clone());
        RevisionMetadata::new(&revision_path, manifest.venv_names(), options.pulled_from)
            .save(&revision.metadata_path())?;

        if !container.is_remote() {
            container.context().installer.install(&revision, manifest)?;
        }

        revision.write_snapshot(manifest)?;
        tracing::info!("revision {} is ready", revision.path.display());
        Ok(revision)
    }

    fn write_snapshot(&self, manifest: &Manifest) -> Result<()> {
        let target = self.manifest_path();
        let text = manifest.to_toml()?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.path)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&target)
            .map_err(|err| Error::WriteFailed {
                path: target,
                error: err.error,
            })?;
        Ok(())
    }

    /// Check the directory name parses and the metadata file exists.
    pub fn validate(&self) -> bool {
        parse_dirname(&self.dirname).is_some() && self.metadata_path().is_file()
    }

    /// Cached [`Revision::validate`].
    pub fn is_valid(&self) -> bool {
        *self.valid.get_or_init(|| self.validate())
    }

    /// Whether the manifest snapshot has been published. Never cached.
    pub fn is_ready(&self) -> bool {
        self.manifest_path().is_file()
    }

    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILENAME)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILENAME)
    }

    /// Creation time in seconds since the epoch.
    pub fn timestamp(&self) -> Option<f64> {
        parse_dirname(&self.dirname)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let ts = self.timestamp()?;
        let micros = (ts * 1_000_000.0).round() as i64;
        let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
        DateTime::from_timestamp(micros.div_euclid(1_000_000), nanos)
    }

    /// The manifest snapshot this revision was built from.
    pub fn manifest(&self) -> Result<Manifest> {
        if !self.is_ready() {
            return Err(Error::RevisionNotReady(self.path.clone()));
        }
        Manifest::load(self.manifest_path())
    }

    pub fn metadata(&self) -> Result<RevisionMetadata> {
        RevisionMetadata::load(&self.metadata_path())
    }

    /// Whether this revision was materialized from a remote one.
    pub fn is_pulled(&self) -> bool {
        self.metadata()
            .map(|metadata| metadata.pulled_from.is_some())
            .unwrap_or(false)
    }

    /// Whether entering this revision means using the remote root.
    pub fn is_using_remote(&self) -> bool {
        self.container.is_remote() || self.is_pulled()
    }

    /// Environment variables declared for this revision.
    ///
    /// Dotenv files are applied first, then the inline `env` table, then the
    /// reserved `REZUP_*` keys. Later values win.
    pub fn recipe_env(&self) -> Result<BTreeMap<String, String>> {
        let manifest = self.manifest()?;
        let mut env = BTreeMap::new();

        if let Some(dotenv) = &manifest.dotenv {
            let base_dir = self.container.context().recipes.dir();
            for reference in dotenv.files() {
                let path = dotenv::resolve_path(reference, base_dir);
                if path.is_file() {
                    env.extend(dotenv::load(&path)?);
                } else {
                    tracing::warn!("dotenv file not found: {}", path.display());
                }
            }
        }

        env.extend(manifest.env);
        env.insert(CONTAINER_ENV_VAR.to_string(), self.container.name().to_string());
        let using_remote = if self.is_using_remote() { "1" } else { "" };
        env.insert(USING_REMOTE_ENV_VAR.to_string(), using_remote.to_string());
        Ok(env)
    }

    /// Directories put on `PATH` when entering this revision.
    ///
    /// Only the generated production entry points are exposed, never the
    /// sub-environments themselves.
    pub fn production_bin_dirs(&self) -> Vec<PathBuf> {
        vec![self.path.join(PRODUCTION_BIN_DIRNAME)]
    }

    /// Shell prompt prefix: container, provenance and creation date.
    pub fn prompt(&self) -> String {
        let date = self
            .datetime()
            .map(|dt| dt.with_timezone(&Local).format(PROMPT_DATE_FORMAT).to_string())
            .unwrap_or_default();
        let provenance = if self.is_using_remote() {
            "remote"
        } else {
            "local"
        };
        format!("({}) - {provenance} - {date} ", self.container.name())
    }

    /// Layer this revision's environment over `caller`.
    ///
    /// The production bin directories are prepended to `PATH`.
    pub fn compose_env(
        &self,
        caller: BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let mut env = caller;
        env.extend(self.recipe_env()?);

        let path_key = env
            .keys()
            .find(|key| {
                if cfg!(windows) {
                    key.eq_ignore_ascii_case("PATH")
                } else {
                    key.as_str() == "PATH"
                }
            })
            .cloned()
            .unwrap_or_else(|| "PATH".to_string());

        let mut paths = self.production_bin_dirs();
        if let Some(existing) = env.get(&path_key) {
            paths.extend(std::env::split_paths(existing));
        }
        let joined = std::env::join_paths(paths)
            .map_err(|err| Error::ValidationFailed(format!("invalid PATH entry: {err}")))?;
        env.insert(path_key, joined.to_string_lossy().into_owned());

        tracing::debug!("composed {} environment variables", env.len());
        Ok(env)
    }

    /// Enter this revision, pulling it first when it is remote.
    ///
    /// Returns the exit code of the shell, command or script. Commands and
    /// scripts started without waiting return `0` right away.
    pub fn use_revision(&self, target: &LaunchTarget, options: &UseOptions) -> Result<i32> {
        let revision = self.require_local(options.pull)?;
        revision.launch(target, options.wait)
    }

    fn launch(&self, target: &LaunchTarget, wait: bool) -> Result<i32> {
        let caller = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        let env = self.compose_env(caller)?;
        let settings = &self.container.context().settings;
        let shell = Shell::detect(settings.default_shell.as_deref())?;
        tracing::debug!("using shell {}", shell.program.display());
        Launcher::new(shell, env, self.prompt()).spawn(target, wait)
    }

    /// Valid siblings strictly older than this one, newest first.
    pub fn iter_backward(&self) -> impl Iterator<Item = Revision> + '_ {
        let timestamp = self.timestamp();
        self.container
            .iter_revision(true, true)
            .filter(move |other| matches!((other.timestamp(), timestamp), (Some(a), Some(b)) if a < b))
    }

    /// Valid siblings strictly newer than this one, oldest first.
    pub fn iter_forward(&self) -> impl Iterator<Item = Revision> + '_ {
        let timestamp = self.timestamp();
        self.container
            .iter_revision(true, false)
            .filter(move |other| matches!((other.timestamp(), timestamp), (Some(a), Some(b)) if a > b))
    }

    /// Remove the revision directory. Invalid revisions are left alone.
    pub fn purge(&self) -> Result<()> {
        if !self.is_valid() {
            return Ok(());
        }
        tracing::info!("removing revision {}", self.path.display());
        std::fs::remove_dir_all(&self.path).map_err(|error| Error::WriteFailed {
            path: self.path.clone(),
            error,
        })
    }
}

/// Make an existing revision directory reusable for a rebuild.
///
/// A directory without a manifest snapshot was left by an interrupted or
/// failed creation, its content is discarded. A published one is never
/// touched.
fn reclaim_unpublished(path: &Path) -> Result<()> {
    if path.join(MANIFEST_FILENAME).is_file() {
        return Err(Error::RevisionPublished(path.to_path_buf()));
    }
    tracing::warn!("rebuilding unfinished revision {}", path.display());
    let write_failed = |error| Error::WriteFailed {
        path: path.to_path_buf(),
        error,
    };
    std::fs::remove_dir_all(path).map_err(write_failed)?;
    std::fs::create_dir(path).map_err(write_failed)
}

/// Create a fresh revision directory named after the current time.
///
/// The directory is created exclusively, on collision the timestamp is
/// bumped by one microsecond until a free name is found.
fn allocate_dirname(revisions: &Path) -> Result<String> {
    let mut micros = Utc::now().timestamp_micros();
    loop {
        let dirname = format_dirname(micros);
        let path = revisions.join(&dirname);
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(dirname),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!("revision {dirname} is taken, bumping");
                micros += 1;
            }
            Err(error) => return Err(Error::WriteFailed { path, error }),
        }
    }
}
