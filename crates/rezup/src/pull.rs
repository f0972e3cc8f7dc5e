// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Materializing remote revisions into the local root.
//!
//! A remote revision only holds metadata and a manifest snapshot. Pulling
//! it installs an equivalent local revision with the same directory name,
//! once per timestamp.

use crate::revision::{CreateOptions, Revision};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./pull_test.rs"]
mod pull_test;

impl Revision {
    /// The local counterpart of this revision.
    ///
    /// Local revisions return themselves. For remote ones the local
    /// container is searched at this revision's timestamp, exactly or with
    /// `fallback` the newest ready one not newer than it. When nothing is
    /// found and `check_out` is set, a local revision is created from this
    /// revision's snapshot, otherwise `None` is returned.
    pub fn pull(&self, check_out: bool, fallback: bool) -> Result<Option<Revision>> {
        let container = self.container();
        if !container.is_remote() {
            return Ok(Some(self.clone()));
        }
        let Some(timestamp) = self.timestamp() else {
            return Err(Error::InvalidRevision(self.path().to_path_buf()));
        };

        let local = container.local_counterpart()?;
        if let Some(found) = local.get_revision_by_time(timestamp, fallback, true) {
            tracing::debug!(
                "remote revision {} already pulled as {}",
                self.dirname(),
                found.path().display()
            );
            return Ok(Some(found));
        }
        if !check_out {
            return Ok(None);
        }

        let manifest = self.manifest()?;
        tracing::info!(
            "pulling revision {} of {} from {}",
            self.dirname(),
            container.name(),
            container.root().display()
        );
        let options = CreateOptions {
            dirname: Some(self.dirname().to_string()),
            pulled_from: Some(self.path().to_path_buf()),
        };
        Revision::create(&local, &manifest, options).map(Some)
    }

    /// The local revision to enter in place of this one.
    ///
    /// Fails when this revision is invalid or not ready, or when it is
    /// remote, has no local counterpart yet and `allow_pull` is false.
    pub fn require_local(&self, allow_pull: bool) -> Result<Revision> {
        if !self.is_valid() {
            return Err(Error::InvalidRevision(self.path().to_path_buf()));
        }
        if !self.is_ready() {
            return Err(Error::RevisionNotReady(self.path().to_path_buf()));
        }
        match self.pull(allow_pull, false)? {
            Some(revision) => Ok(revision),
            None => Err(Error::NoLocalRevision {
                container: self.container().name().to_string(),
                timestamp: self.dirname().to_string(),
            }),
        }
    }
}
