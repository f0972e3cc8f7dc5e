// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `rezup drop` command.

use clap::Args;
use miette::Result;
use rezup::Container;

/// Remove a container that holds no revision
#[derive(Debug, Args)]
pub struct CmdDrop {
    /// Container name
    pub name: String,

    /// Drop the container from the remote root
    #[clap(long)]
    pub remote: bool,
}

impl CmdDrop {
    pub fn run(&mut self, roots: &crate::RootFlags) -> Result<i32> {
        let context = roots.context()?;
        let container = if self.remote {
            Container::remote(&self.name, &context)?
        } else {
            Container::local(&self.name, &context)?
        };

        if !container.exists() {
            println!("Container '{}' does not exist", self.name);
            return Ok(0);
        }

        container.purge()?;
        println!("Dropped container '{}'", self.name);
        Ok(0)
    }
}
