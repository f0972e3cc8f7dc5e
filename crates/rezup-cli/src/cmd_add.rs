// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `rezup add` command.

use clap::Args;
use colored::Colorize;
use miette::Result;
use rezup::{Container, LaunchTarget, UseOptions, DEFAULT_CONTAINER_NAME};

/// Create a new revision of a container
#[derive(Debug, Args)]
pub struct CmdAdd {
    /// Container name
    #[clap(default_value = DEFAULT_CONTAINER_NAME)]
    pub name: String,

    /// Publish the revision to the remote root
    #[clap(long)]
    pub remote: bool,

    /// Do not enter the new revision
    #[clap(long)]
    pub skip_use: bool,
}

impl CmdAdd {
    pub fn run(&mut self, roots: &crate::RootFlags) -> Result<i32> {
        let context = roots.context()?;
        let container = if self.remote {
            Container::remote(&self.name, &context)?
        } else {
            Container::local(&self.name, &context)?
        };

        let recipe = context.recipes.path_for(&self.name);
        if !recipe.is_file() {
            tracing::info!("no recipe at {}, using the default one", recipe.display());
        }

        let revision = container.new_revision()?;
        println!(
            "Created revision {} of {} in {}",
            revision.dirname().green(),
            self.name.cyan(),
            container.root().display()
        );

        if self.remote && roots.always_pull {
            if let Some(local) = revision.pull(true, false)? {
                println!("Installed locally at {}", local.path().display());
            }
        }

        if self.skip_use {
            return Ok(0);
        }
        if let Some(current) = crate::current_container() {
            tracing::warn!("already inside container '{current}', not entering the new revision");
            return Ok(0);
        }

        let options = UseOptions {
            wait: true,
            pull: true,
        };
        Ok(revision.use_revision(&LaunchTarget::Interactive, &options)?)
    }
}
