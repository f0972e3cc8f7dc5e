// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Revision creation record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Written once when a revision directory is created, read-only after.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RevisionMetadata {
    pub rezup_version: String,
    pub creator: String,
    pub hostname: String,
    pub created: DateTime<Utc>,
    pub revision_path: PathBuf,
    /// Sub-environments the installer produces, primary tool first.
    pub venvs: Vec<String>,
    /// The remote revision this one was materialized from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulled_from: Option<PathBuf>,
}

impl RevisionMetadata {
    /// Describe a revision being created right now by this user and host.
    pub fn new(revision_path: &Path, venvs: Vec<String>, pulled_from: Option<PathBuf>) -> Self {
        Self {
            rezup_version: env!("CARGO_PKG_VERSION").to_string(),
            creator: whoami::username(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            created: Utc::now(),
            revision_path: revision_path.to_path_buf(),
            venvs,
            pulled_from,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;
        serde_json::from_str(&text).map_err(|error| Error::InvalidMetadata {
            path: path.to_path_buf(),
            error,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|error| Error::InvalidMetadata {
            path: path.to_path_buf(),
            error,
        })?;
        std::fs::write(path, text).map_err(|error| Error::WriteFailed {
            path: path.to_path_buf(),
            error,
        })
    }
}
