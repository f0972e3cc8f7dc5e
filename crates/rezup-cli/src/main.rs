// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! rezup - Versioned Tool Environment Containers CLI

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::Result;

mod cmd_add;
mod cmd_drop;
mod cmd_init;
mod cmd_list;
mod cmd_show;
mod cmd_use;

use cmd_add::CmdAdd;
use cmd_drop::CmdDrop;
use cmd_init::CmdInit;
use cmd_list::CmdList;
use cmd_show::CmdShow;
use cmd_use::CmdUse;


#[derive(Parser)]
#[clap(
    name = "rezup",
    about = "Versioned Tool Environment Containers",
    version,
    long_about = "Create, publish and enter time-versioned tool environments"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(flatten)]
    roots: RootFlags,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Args)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

/// Where containers and recipes live, and how to enter them.
#[derive(Args, Clone, Debug, Default)]
pub struct RootFlags {
    /// Local root of containers [default: ~/.rezup]
    #[clap(long, global = true, env = "REZUP_ROOT_LOCAL")]
    pub local_root: Option<String>,

    /// Shared remote root of containers
    #[clap(long, global = true, env = "REZUP_ROOT_REMOTE")]
    pub remote_root: Option<String>,

    /// Directory holding container recipe files [default: ~]
    #[clap(long, global = true, env = "REZUP_RECIPE_DIR")]
    pub recipe_dir: Option<String>,

    /// Shell to launch instead of the detected one
    #[clap(long, global = true, env = "REZUP_DEFAULT_SHELL")]
    pub shell: Option<String>,

    /// Install remote revisions locally as soon as they are added
    #[clap(
        long,
        global = true,
        env = "REZUP_ALWAYS_PULL",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub always_pull: bool,
}

fn expand_path(value: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(value)
        .map_err(|err| miette::miette!("Failed to expand path {value:?}: {err}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

impl RootFlags {
    pub fn settings(&self) -> Result<rezup::Settings> {
        let path = |value: &Option<String>| -> Result<Option<PathBuf>> {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(expand_path)
                .transpose()
        };
        Ok(rezup::Settings {
            local_root: path(&self.local_root)?,
            remote_root: path(&self.remote_root)?,
            recipe_dir: path(&self.recipe_dir)?,
            default_shell: self.shell.clone().filter(|s| !s.is_empty()),
        })
    }

    pub fn context(&self) -> Result<Arc<rezup::Context>> {
        Ok(rezup::Context::new(self.settings()?)?)
    }
}

/// Name of the container the current process is already inside of.
pub fn current_container() -> Option<String> {
    std::env::var(rezup::CONTAINER_ENV_VAR)
        .ok()
        .filter(|name| !name.is_empty())
}

#[derive(Subcommand)]
enum Command {
    /// Enter the latest revision of a container
    Use(CmdUse),

    /// Create a new revision of a container
    Add(CmdAdd),

    /// Remove a container that holds no revision
    Drop(CmdDrop),

    /// List containers and their revisions
    List(CmdList),

    /// Display the latest revision of a container
    Show(CmdShow),

    /// Create a container recipe file
    Init(CmdInit),
}

impl Command {
    fn run(&mut self, roots: &RootFlags) -> Result<i32> {
        match self {
            Command::Use(cmd) => cmd.run(roots),
            Command::Add(cmd) => cmd.run(roots),
            Command::Drop(cmd) => cmd.run(roots),
            Command::List(cmd) => cmd.run(roots),
            Command::Show(cmd) => cmd.run(roots),
            Command::Init(cmd) => cmd.run(roots),
        }
    }
}

impl Opt {
    fn run(mut self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        self.cmd.run(&self.roots)
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
