// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `rezup list` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

/// List containers and their revisions
#[derive(Debug, Args)]
pub struct CmdList {
    /// List containers of the remote root
    #[clap(long)]
    pub remote: bool,
}

impl CmdList {
    pub fn run(&mut self, roots: &crate::RootFlags) -> Result<i32> {
        let context = roots.context()?;
        let containers = rezup::iter_containers(&context, self.remote)?;

        if containers.is_empty() {
            println!("{}", "(no containers)".dimmed());
            return Ok(0);
        }

        for container in &containers {
            println!("{}  {}", container.name().bold(), container.path().display());
            let mut count = 0;
            for revision in container.iter_revision(true, true) {
                count += 1;
                let date = revision
                    .datetime()
                    .map(|dt| {
                        dt.with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()
                    })
                    .unwrap_or_default();
                let state = if revision.is_ready() {
                    "ready".green()
                } else {
                    "creating".yellow()
                };
                let pulled = if revision.is_pulled() { " [pulled]" } else { "" };
                println!(
                    "  {}  {}  {}{}",
                    revision.dirname().cyan(),
                    date,
                    state,
                    pulled.blue()
                );
            }
            if count == 0 {
                println!("  {}", "(no revisions)".dimmed());
            }
        }

        Ok(0)
    }
}
