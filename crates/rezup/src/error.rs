// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for rezup operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with rezup Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during rezup operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Revision has no metadata or an unparsable name
    #[error("Cannot use invalid revision: {0:?}")]
    #[diagnostic(code(rezup::invalid_revision))]
    InvalidRevision(PathBuf),

    /// Revision manifest snapshot has not been written yet
    #[error("Revision is not ready to be used: {0:?}")]
    #[diagnostic(
        code(rezup::revision_not_ready),
        help("The revision may still be installing, or its installation failed")
    )]
    RevisionNotReady(PathBuf),

    /// Remote revision has not been materialized on this machine
    #[error("No local revision of container '{container}' at {timestamp}")]
    #[diagnostic(
        code(rezup::no_local_revision),
        help("Pull the remote revision first, or allow pulling when using it")
    )]
    NoLocalRevision { container: String, timestamp: String },

    /// Container still holds revisions, some may be in creation
    #[error("Revision exists in {0:?}, it may be creating")]
    #[diagnostic(
        code(rezup::revision_exists),
        help("Containers can only be dropped once they hold no revision")
    )]
    RevisionExists(PathBuf),

    /// A ready revision already uses the requested directory name
    #[error("Revision {0:?} is already published")]
    #[diagnostic(
        code(rezup::revision_published),
        help("Published revisions are never rebuilt, create a new one instead")
    )]
    RevisionPublished(PathBuf),

    /// No remote root configured
    #[error("Remote root not provided")]
    #[diagnostic(
        code(rezup::no_remote_root),
        help("Set REZUP_ROOT_REMOTE or pass --remote-root")
    )]
    NoRemoteRoot,

    /// No home directory to derive the default local root from
    #[error("Cannot resolve default local root without a home directory")]
    #[diagnostic(code(rezup::no_home), help("Set REZUP_ROOT_LOCAL"))]
    NoHomeDirectory,

    /// Shell without a launch table entry
    #[error("Unsupported shell: {0}")]
    #[diagnostic(
        code(rezup::unsupported_shell),
        help("Pick a supported shell with REZUP_DEFAULT_SHELL or --shell")
    )]
    UnsupportedShell(String),

    /// Recipe or manifest snapshot could not be parsed
    #[error("Invalid recipe file {path:?}: {error}")]
    #[diagnostic(code(rezup::invalid_recipe))]
    InvalidRecipe {
        path: PathBuf,
        #[source]
        error: toml::de::Error,
    },

    /// Manifest could not be serialized
    #[error("Failed to serialize manifest: {0}")]
    #[diagnostic(code(rezup::serialize_manifest))]
    SerializeManifest(#[from] toml::ser::Error),

    /// Revision metadata could not be parsed or written
    #[error("Invalid revision metadata {path:?}: {error}")]
    #[diagnostic(code(rezup::invalid_metadata))]
    InvalidMetadata {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },

    /// Validation error
    #[error("Validation failed: {0}")]
    #[diagnostic(code(rezup::validation_failed))]
    ValidationFailed(String),

    /// Installer step exited unsuccessfully
    #[error("Failed to install '{tool}': {command} exited with {code:?}")]
    #[diagnostic(code(rezup::install_failed))]
    InstallFailed {
        tool: String,
        command: String,
        code: Option<i32>,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(rezup::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to write file
    #[error("Failed to write file: {path:?}")]
    #[diagnostic(code(rezup::write_failed))]
    WriteFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to start a child process
    #[error("Failed to launch {program:?}")]
    #[diagnostic(code(rezup::launch_failed))]
    LaunchFailed {
        program: String,
        #[source]
        error: std::io::Error,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(rezup::io_error))]
    Io(#[from] std::io::Error),
}
