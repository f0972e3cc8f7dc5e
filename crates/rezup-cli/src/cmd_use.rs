// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `rezup use` command.

use std::path::PathBuf;

use clap::Args;
use miette::Result;
use rezup::{Container, LaunchTarget, UseOptions, DEFAULT_CONTAINER_NAME};

/// Enter the latest revision of a container
#[derive(Debug, Args)]
pub struct CmdUse {
    /// Container name
    #[clap(default_value = DEFAULT_CONTAINER_NAME)]
    pub name: String,

    /// Run a script in the container and exit
    #[clap(long, conflicts_with = "command")]
    pub run: Option<PathBuf>,

    /// Do not wait for the script or command to finish
    #[clap(long)]
    pub no_wait: bool,

    /// Fail instead of installing a remote revision locally
    #[clap(long)]
    pub no_pull: bool,

    /// Command to run in the container instead of a shell
    #[clap(last = true)]
    pub command: Vec<String>,
}

impl CmdUse {
    pub fn target(&self) -> LaunchTarget {
        if let Some(script) = &self.run {
            LaunchTarget::Script(script.clone())
        } else if !self.command.is_empty() {
            LaunchTarget::Args(self.command.clone())
        } else {
            LaunchTarget::Interactive
        }
    }

    pub fn options(&self) -> UseOptions {
        UseOptions {
            wait: !self.no_wait,
            pull: !self.no_pull,
        }
    }

    pub fn run(&mut self, roots: &crate::RootFlags) -> Result<i32> {
        if let Some(current) = crate::current_container() {
            return Err(miette::miette!(
                help = "Exit the current container before entering another one",
                "Already inside container '{current}'"
            ));
        }

        let context = roots.context()?;
        let container = Container::new(&self.name, &context)?;

        let revision = match container.get_latest_revision(true) {
            Some(revision) => revision,
            None if self.name == DEFAULT_CONTAINER_NAME && container.is_empty() => {
                tracing::info!("creating default container at {}", container.path().display());
                container.new_revision()?
            }
            None => {
                return Err(miette::miette!(
                    help = format!("Create one with 'rezup add {}'", self.name),
                    "Container '{}' has no ready revision in {}",
                    self.name,
                    container.root().display()
                ));
            }
        };

        Ok(revision.use_revision(&self.target(), &self.options())?)
    }
}
