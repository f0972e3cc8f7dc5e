// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Spawning shells and commands inside a composed environment.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::shell::{LaunchScript, Shell, ShellKind};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./launch_test.rs"]
mod launch_test;

const PROMPT_PLACEHOLDER: &str = "__REZUP_PROMPT__";
const COMMAND_PLACEHOLDER: &str = "__REZUP_COMMAND__";

/// What to run in the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// An interactive shell that stays open.
    Interactive,
    /// A command line for the shell to run, then exit.
    Command(String),
    /// A program and its arguments, each quoted for the shell, then exit.
    Args(Vec<String>),
    /// A script file for the shell to run, then exit.
    Script(PathBuf),
}

impl LaunchTarget {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// Everything needed to start the child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Variables layered over the composed environment.
    pub env: Vec<(String, OsString)>,
    /// Fresh directory holding rendered launch scripts, if any were needed.
    pub launch_dir: Option<PathBuf>,
}

/// Starts processes in a composed environment without touching the
/// environment of the current process.
#[derive(Debug, Clone)]
pub struct Launcher {
    shell: Shell,
    env: BTreeMap<String, String>,
    prompt: String,
}

impl Launcher {
    pub fn new(shell: Shell, env: BTreeMap<String, String>, prompt: impl Into<String>) -> Self {
        Self {
            shell,
            env,
            prompt: prompt.into(),
        }
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Work out the command line, rendering launch scripts into a new
    /// temporary directory when the shell needs one.
    ///
    /// The directory is left behind for the OS to clean up, the child may
    /// still be reading from it after this process is gone.
    pub fn plan(&self, target: &LaunchTarget) -> Result<LaunchPlan> {
        let mut plan = LaunchPlan {
            program: self.shell.program.clone(),
            args: Vec::new(),
            env: Vec::new(),
            launch_dir: None,
        };

        match target {
            LaunchTarget::Interactive => {
                if let Some(script) = self.shell.interactive_script() {
                    let dir = new_launch_dir()?;
                    let text = render(script, &self.prompt, self.shell.kind, None);
                    write_script(&dir, script, &text)?;
                    plan.args = self.shell.interactive_args(Some(&dir));
                    plan.env = self.shell.interactive_env(&dir);
                    plan.launch_dir = Some(dir);
                } else {
                    plan.args = self.shell.interactive_args(None);
                }
            }
            LaunchTarget::Command(command) => self.plan_command(&mut plan, command)?,
            LaunchTarget::Args(args) => {
                let command = self.shell.kind.join_args(args);
                self.plan_command(&mut plan, &command)?;
            }
            LaunchTarget::Script(path) => {
                let path = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                plan.args
                    .extend(self.shell.kind.script_flags().iter().map(OsString::from));
                plan.args.push(path.into_os_string());
            }
        }

        Ok(plan)
    }

    fn plan_command(&self, plan: &mut LaunchPlan, command: &str) -> Result<()> {
        match self.shell.kind.command_flags() {
            Some(flags) => {
                plan.args.extend(flags.iter().map(OsString::from));
                plan.args.push(command.into());
            }
            None => {
                // no clean "-c" equivalent, run it from a generated script
                let dir = new_launch_dir()?;
                let script = LaunchScript::RunBat;
                let text = render(script, &self.prompt, self.shell.kind, Some(command));
                let path = write_script(&dir, script, &text)?;
                plan.args
                    .extend(self.shell.kind.script_flags().iter().map(OsString::from));
                plan.args.push(path.into_os_string());
                plan.launch_dir = Some(dir);
            }
        }
        Ok(())
    }

    /// Start `target` and return its exit code.
    ///
    /// Interactive sessions always block. Commands and scripts started with
    /// `wait == false` are left running on their own and `0` is returned
    /// right away.
    pub fn spawn(&self, target: &LaunchTarget, wait: bool) -> Result<i32> {
        let plan = self.plan(target)?;
        let program = plan.program.display().to_string();

        let mut command = Command::new(&plan.program);
        command
            .args(&plan.args)
            .env_clear()
            .envs(&self.env)
            .envs(plan.env.iter().map(|(k, v)| (k, v)));

        tracing::info!("launching {program} {:?}", plan.args);

        if !wait && !target.is_interactive() {
            command.spawn().map_err(|error| Error::LaunchFailed {
                program: program.clone(),
                error,
            })?;
            return Ok(0);
        }

        let status = command
            .status()
            .map_err(|error| Error::LaunchFailed { program, error })?;
        Ok(exit_code(status))
    }
}

fn new_launch_dir() -> Result<PathBuf> {
    let dir = tempfile::Builder::new().prefix("rezup-launch-").tempdir()?;
    Ok(dir.keep())
}

fn write_script(dir: &Path, script: LaunchScript, text: &str) -> Result<PathBuf> {
    let path = dir.join(script.file_name());
    // bytes as-is, the batch templates carry their own line endings
    std::fs::write(&path, text.as_bytes()).map_err(|error| Error::WriteFailed {
        path: path.clone(),
        error,
    })?;
    Ok(path)
}

/// Fill the placeholders of a launch script template.
pub fn render(script: LaunchScript, prompt: &str, kind: ShellKind, command: Option<&str>) -> String {
    let mut text = script
        .template()
        .replace(PROMPT_PLACEHOLDER, &escape_prompt(kind, prompt));
    if let Some(command) = command {
        text = text.replace(COMMAND_PLACEHOLDER, command);
    }
    text
}

/// Escape the prompt for a double quoted string in the shell's own syntax.
pub fn escape_prompt(kind: ShellKind, prompt: &str) -> String {
    let mut escaped = String::with_capacity(prompt.len());
    for c in prompt.chars() {
        match kind {
            ShellKind::Cmd => match c {
                '$' => escaped.push_str("$$"),
                '"' => {}
                _ => escaped.push(c),
            },
            ShellKind::PowerShell | ShellKind::Pwsh => {
                if matches!(c, '`' | '"' | '$') {
                    escaped.push('`');
                }
                escaped.push(c);
            }
            ShellKind::Xonsh => {
                if matches!(c, '\\' | '"') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            _ => {
                if matches!(c, '\\' | '"' | '$' | '`') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
        }
    }
    escaped
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
