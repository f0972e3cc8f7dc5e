// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `rezup show` command.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use rezup::{Container, Manifest, Revision, DEFAULT_CONTAINER_NAME};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShowFormat {
    Table,
    Yaml,
    Json,
}

/// Display the latest revision of a container
#[derive(Debug, Args)]
pub struct CmdShow {
    /// Container name
    #[clap(default_value = DEFAULT_CONTAINER_NAME)]
    pub name: String,

    /// Look in the local root even when a remote root is configured
    #[clap(long)]
    pub local: bool,

    /// Output format
    #[clap(long, value_enum, default_value_t = ShowFormat::Table)]
    pub format: ShowFormat,
}

/// What `show` reports about a revision.
#[derive(Debug, Serialize)]
pub struct RevisionInfo {
    pub container: String,
    pub remote: bool,
    pub revision: String,
    pub path: PathBuf,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub venvs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulled_from: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
}

impl RevisionInfo {
    pub fn collect(revision: &Revision) -> Self {
        let metadata = revision.metadata().ok();
        Self {
            container: revision.container().name().to_string(),
            remote: revision.container().is_remote(),
            revision: revision.dirname().to_string(),
            path: revision.path().to_path_buf(),
            ready: revision.is_ready(),
            creator: metadata.as_ref().map(|m| m.creator.clone()),
            hostname: metadata.as_ref().map(|m| m.hostname.clone()),
            created: metadata.as_ref().map(|m| m.created.to_rfc3339()),
            venvs: metadata
                .as_ref()
                .map(|m| m.venvs.clone())
                .unwrap_or_default(),
            pulled_from: metadata.and_then(|m| m.pulled_from),
            manifest: revision.manifest().ok(),
        }
    }
}

impl CmdShow {
    pub fn run(&mut self, roots: &crate::RootFlags) -> Result<i32> {
        let context = roots.context()?;
        let container = Container::open(&self.name, &context, self.local)?;

        let Some(revision) = container.get_latest_revision(true) else {
            return Err(miette::miette!(
                "Container '{}' has no ready revision in {}",
                self.name,
                container.root().display()
            ));
        };
        let info = RevisionInfo::collect(&revision);

        match self.format {
            ShowFormat::Yaml => print!("{}", serde_yaml::to_string(&info).into_diagnostic()?),
            ShowFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&info).into_diagnostic()?)
            }
            ShowFormat::Table => self.show_table(&info),
        }

        Ok(0)
    }

    fn show_table(&self, info: &RevisionInfo) {
        let location = if info.remote { "remote" } else { "local" };
        println!(
            "{} {} ({})",
            "Container:".bold(),
            info.container.cyan(),
            location.yellow()
        );
        println!("{} {}", "Revision:".bold(), info.revision.green());
        println!("{} {}", "Path:".bold(), info.path.display());
        if let Some(created) = &info.created {
            println!("{} {}", "Created:".bold(), created);
        }
        if let (Some(creator), Some(hostname)) = (&info.creator, &info.hostname) {
            println!("{} {}@{}", "Creator:".bold(), creator, hostname);
        }
        if let Some(pulled_from) = &info.pulled_from {
            println!("{} {}", "Pulled from:".bold(), pulled_from.display());
        }

        let Some(manifest) = &info.manifest else {
            return;
        };
        if let Some(description) = &manifest.description {
            println!("{} {}", "Description:".bold(), description.dimmed());
        }

        println!();
        println!("{}", "Tools:".bold());
        for tool in manifest.tools() {
            let mut markers = Vec::new();
            if tool.edit {
                markers.push("edit");
            }
            if tool.isolation {
                markers.push("isolated");
            }
            let markers = if markers.is_empty() {
                String::new()
            } else {
                format!(" [{}]", markers.join(", "))
            };
            println!("  {} {}{}", tool.name.cyan(), tool.url, markers.yellow());
        }

        if let Some(shared) = &manifest.shared {
            println!();
            println!("{} {}", "Shared:".bold(), shared.name.cyan());
            for requirement in &shared.requires {
                println!("  {requirement}");
            }
        }

        if !manifest.env.is_empty() {
            println!();
            println!("{}", "Environment Variables:".bold());
            for (key, value) in &manifest.env {
                println!("  {} = {}", key.cyan(), value.green());
            }
        }
    }
}
