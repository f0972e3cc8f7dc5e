// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Named, root-scoped collections of revisions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::revision::{CreateOptions, Revision};
use crate::settings::Context;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./container_test.rs"]
mod container_test;

pub const REVISIONS_DIRNAME: &str = "revisions";
pub const LIBS_DIRNAME: &str = "libs";

/// A family of revisions identified by name.
///
/// The root, and so whether the container is remote, is fixed when the
/// container is constructed.
#[derive(Debug, Clone)]
pub struct Container {
    name: String,
    root: PathBuf,
    path: PathBuf,
    remote: bool,
    context: Arc<Context>,
}

impl Container {
    /// Open a container in the root the settings pick for it, the remote
    /// root when one is configured.
    pub fn new(name: &str, context: &Arc<Context>) -> Result<Self> {
        Self::open(name, context, false)
    }

    pub fn open(name: &str, context: &Arc<Context>, force_local: bool) -> Result<Self> {
        let (root, remote) = context.settings.resolve_root(name, force_local)?;
        Ok(Self::with_root(name, root, remote, context))
    }

    /// Open a container in the local root.
    pub fn local(name: &str, context: &Arc<Context>) -> Result<Self> {
        Self::open(name, context, true)
    }

    /// Open a container in the remote root.
    pub fn remote(name: &str, context: &Arc<Context>) -> Result<Self> {
        let root = context.settings.remote_root().ok_or(Error::NoRemoteRoot)?;
        Ok(Self::with_root(name, root, true, context))
    }

    pub fn with_root(
        name: &str,
        root: impl Into<PathBuf>,
        remote: bool,
        context: &Arc<Context>,
    ) -> Self {
        let root = root.into();
        Self {
            name: name.to_string(),
            path: root.join(name),
            root,
            remote,
            context: Arc::clone(context),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn revisions_path(&self) -> PathBuf {
        self.path.join(REVISIONS_DIRNAME)
    }

    /// Where shared libraries are installed, once for all revisions.
    pub fn libs_path(&self) -> PathBuf {
        self.path.join(LIBS_DIRNAME)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// True when no revision directory exists, valid or not.
    pub fn is_empty(&self) -> bool {
        self.iter_revision(false, true).next().is_none()
    }

    /// The same container in the local root.
    pub fn local_counterpart(&self) -> Result<Self> {
        if !self.remote {
            return Ok(self.clone());
        }
        let root = self.context.settings.local_root()?;
        Ok(Self::with_root(&self.name, root, false, &self.context))
    }

    /// Revisions in time order, newest first unless `latest_first` is false.
    ///
    /// With `validate`, revisions without metadata or with an unparsable
    /// name are skipped. A missing container yields nothing.
    pub fn iter_revision(
        &self,
        validate: bool,
        latest_first: bool,
    ) -> impl Iterator<Item = Revision> + '_ {
        let mut entries: Vec<(f64, String)> = match std::fs::read_dir(self.revisions_path()) {
            Ok(read_dir) => read_dir
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
                .filter_map(|entry| entry.file_name().into_string().ok())
                .map(|name| {
                    let key = crate::revision::parse_dirname(&name).unwrap_or(f64::NEG_INFINITY);
                    (key, name)
                })
                .collect(),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("cannot list revisions of {}: {err}", self.name);
                }
                Vec::new()
            }
        };
        entries.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        if latest_first {
            entries.reverse();
        }

        entries
            .into_iter()
            .map(move |(_, dirname)| Revision::new(self.clone(), dirname))
            .filter(move |revision| {
                let keep = !validate || revision.is_valid();
                if !keep {
                    tracing::debug!("skipping invalid revision {}", revision.path().display());
                }
                keep
            })
    }

    /// The newest valid revision, only ready ones when `only_ready`.
    pub fn get_latest_revision(&self, only_ready: bool) -> Option<Revision> {
        self.iter_revision(true, true)
            .find(|revision| !only_ready || revision.is_ready())
    }

    /// The revision created at exactly `timestamp`, or with `fallback` the
    /// newest one created no later than it.
    pub fn get_revision_by_time(
        &self,
        timestamp: f64,
        fallback: bool,
        only_ready: bool,
    ) -> Option<Revision> {
        self.iter_revision(true, true)
            .filter(|revision| !only_ready || revision.is_ready())
            .find(|revision| match revision.timestamp() {
                Some(ts) => ts == timestamp || (fallback && ts <= timestamp),
                None => false,
            })
    }

    /// Create a revision stamped now from the container's current recipe.
    pub fn new_revision(&self) -> Result<Revision> {
        let manifest = self.context.recipes.load(&self.name)?;
        Revision::create(self, &manifest, CreateOptions::default())
    }

    /// Remove the container when it holds no revision.
    ///
    /// Any revision directory, ready or not, makes this fail since it may
    /// be in creation. The root is removed too once it is empty.
    pub fn purge(&self) -> Result<()> {
        if self.exists() {
            if let Some(revision) = self.iter_revision(false, true).next() {
                return Err(Error::RevisionExists(revision.path().to_path_buf()));
            }
            tracing::info!("removing container {}", self.path.display());
            std::fs::remove_dir_all(&self.path).map_err(|error| Error::WriteFailed {
                path: self.path.clone(),
                error,
            })?;
        }

        let root_is_empty = std::fs::read_dir(&self.root)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if root_is_empty {
            tracing::debug!("removing empty root {}", self.root.display());
            std::fs::remove_dir(&self.root).map_err(|error| Error::WriteFailed {
                path: self.root.clone(),
                error,
            })?;
        }
        Ok(())
    }
}

/// Containers present under the local or remote root, sorted by name.
pub fn iter_containers(context: &Arc<Context>, remote: bool) -> Result<Vec<Container>> {
    let root = if remote {
        context
            .settings
            .remote_root()
            .ok_or(Error::NoRemoteRoot)?
            .to_path_buf()
    } else {
        context.settings.local_root()?
    };

    let read_dir = match std::fs::read_dir(&root) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(Error::ReadFailed { path: root, error }),
    };

    let mut names: Vec<String> = read_dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    Ok(names
        .iter()
        .map(|name| Container::with_root(name, &root, remote, context))
        .collect())
}
