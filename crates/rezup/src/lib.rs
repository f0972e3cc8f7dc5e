// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! rezup - Versioned Tool Environment Containers
//!
//! This crate provides the core library for managing named, time-versioned
//! environments ("containers") so a tool can be upgraded in the background
//! without interrupting users already inside it.
//!
//! # Overview
//!
//! Each container holds revisions, one directory per creation timestamp.
//! A revision is published by writing its manifest snapshot last, so readers
//! never see one that is half built. Containers live either in a per-machine
//! local root or in a shared remote root that only holds manifests; remote
//! revisions are installed locally on first use, once per timestamp.
//!
//! # Layout
//!
//! ```text
//! <root>/<name>/revisions/<timestamp>/revision.json
//! <root>/<name>/revisions/<timestamp>/rezup.toml
//! <root>/<name>/revisions/<timestamp>/venv/<tool>/...
//! <root>/<name>/libs/<shared>/...
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rezup::{Container, Context, LaunchTarget, Settings, UseOptions};
//!
//! # fn main() -> rezup::Result<()> {
//! let context = Context::new(Settings::default())?;
//! let container = Container::new(".main", &context)?;
//! if let Some(revision) = container.get_latest_revision(true) {
//!     let code = revision.use_revision(&LaunchTarget::Interactive, &UseOptions::default())?;
//!     std::process::exit(code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod container;
pub mod dotenv;
pub mod error;
pub mod installer;
pub mod launch;
pub mod manifest;
pub mod metadata;
pub mod pull;
pub mod recipe;
pub mod revision;
pub mod settings;
pub mod shell;

#[cfg(test)]
mod fixtures;

pub use container::{iter_containers, Container};
pub use error::{Error, Result};
pub use installer::{Installer, PipInstaller};
pub use launch::{LaunchTarget, Launcher};
pub use manifest::{Dotenv, Manifest, SharedLib, Tool};
pub use metadata::RevisionMetadata;
pub use recipe::{RecipeBook, DEFAULT_CONTAINER_NAME};
pub use revision::{CreateOptions, Revision, UseOptions, CONTAINER_ENV_VAR, USING_REMOTE_ENV_VAR};
pub use settings::{Context, Settings};
pub use shell::{Shell, ShellKind};
