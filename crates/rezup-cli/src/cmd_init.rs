// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `rezup init` command.

use clap::Args;
use miette::Result;
use rezup::DEFAULT_CONTAINER_NAME;

/// Create a container recipe file
#[derive(Debug, Args)]
pub struct CmdInit {
    /// Container name
    #[clap(default_value = DEFAULT_CONTAINER_NAME)]
    pub name: String,
}

impl CmdInit {
    pub fn run(&mut self, roots: &crate::RootFlags) -> Result<i32> {
        let context = roots.context()?;
        let path = context.recipes.create(&self.name)?;

        println!("Created recipe at {:?}", path);
        println!();
        println!("Next steps:");
        println!("  1. Edit the file to pick tools and environment variables");
        println!("  2. Run 'rezup add {}' to build a revision", self.name);
        println!("  3. Run 'rezup use {}' to enter it", self.name);

        Ok(0)
    }
}
