// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Shell detection and the per-shell launch flag table.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use sysinfo::{ProcessesToUpdate, System};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./shell_test.rs"]
mod shell_test;

/// How far up the process tree to look for the invoking shell.
const MAX_PROBE_DEPTH: usize = 8;

/// Shell families with a known launch convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    /// Bourne compatible: sh, dash, ash
    Sh,
    Bash,
    Ksh,
    Zsh,
    Fish,
    Csh,
    Tcsh,
    Cmd,
    PowerShell,
    Pwsh,
    Xonsh,
}

impl ShellKind {
    /// Identify a shell from a name or path such as `/bin/bash`,
    /// `-zsh` (login shell) or `pwsh.exe`.
    pub fn from_name(name: &str) -> Option<Self> {
        let file_name = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(name)
            .trim_start_matches('-')
            .to_lowercase();
        let stem = file_name.strip_suffix(".exe").unwrap_or(&file_name);
        let kind = match stem {
            "sh" | "dash" | "ash" => Self::Sh,
            "bash" => Self::Bash,
            "ksh" | "mksh" => Self::Ksh,
            "zsh" => Self::Zsh,
            "fish" => Self::Fish,
            "csh" => Self::Csh,
            "tcsh" => Self::Tcsh,
            "cmd" => Self::Cmd,
            "powershell" => Self::PowerShell,
            "pwsh" => Self::Pwsh,
            "xonsh" => Self::Xonsh,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sh => "sh",
            Self::Bash => "bash",
            Self::Ksh => "ksh",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::Csh => "csh",
            Self::Tcsh => "tcsh",
            Self::Cmd => "cmd",
            Self::PowerShell => "powershell",
            Self::Pwsh => "pwsh",
            Self::Xonsh => "xonsh",
        }
    }

    /// Flags that make the shell run `command` and exit, when it has a
    /// usable `-c` equivalent.
    pub fn command_flags(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Cmd => None,
            Self::PowerShell | Self::Pwsh => Some(&["-NoLogo", "-Command"]),
            _ => Some(&["-c"]),
        }
    }

    /// Quote one argument so the shell hands it to the program unchanged.
    pub fn quote_arg(&self, arg: &str) -> String {
        let plain = !arg.is_empty()
            && arg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@".contains(c));
        if plain {
            return arg.to_string();
        }
        match self {
            Self::Cmd => format!("\"{}\"", arg.replace('%', "%%").replace('"', "\\\"")),
            Self::PowerShell | Self::Pwsh => format!("'{}'", arg.replace('\'', "''")),
            Self::Fish | Self::Xonsh => {
                format!("'{}'", arg.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            _ => format!("'{}'", arg.replace('\'', "'\\''")),
        }
    }

    /// A command line running `args` as a single program invocation.
    pub fn join_args<S: AsRef<str>>(&self, args: &[S]) -> String {
        let line = args
            .iter()
            .map(|arg| self.quote_arg(arg.as_ref()))
            .collect::<Vec<_>>()
            .join(" ");
        match self {
            // a leading string is an expression, not a call
            Self::PowerShell | Self::Pwsh => format!("& {line}"),
            // keep xonsh in subprocess mode
            Self::Xonsh => format!("![{line}]"),
            _ => line,
        }
    }

    /// Flags placed before a script file the shell should run and exit.
    pub fn script_flags(&self) -> &'static [&'static str] {
        match self {
            Self::Cmd => &["/Q", "/C"],
            Self::PowerShell | Self::Pwsh => &["-NoLogo", "-File"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ShellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved shell: its family and the program to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub kind: ShellKind,
    pub program: PathBuf,
}

impl Shell {
    /// Shell from a name or full path.
    pub fn from_name(name: &str) -> Result<Self> {
        let kind =
            ShellKind::from_name(name).ok_or_else(|| Error::UnsupportedShell(name.to_string()))?;
        Ok(Self {
            kind,
            program: PathBuf::from(name.trim_start_matches('-')),
        })
    }

    /// Resolve the shell to launch.
    ///
    /// The explicit override wins, then the shell this process was started
    /// from, then the platform default.
    pub fn detect(override_name: Option<&str>) -> Result<Self> {
        if let Some(name) = override_name.filter(|n| !n.is_empty()) {
            tracing::debug!("using shell override {name}");
            return Self::from_name(name);
        }
        if let Some(shell) = probe_parent_shell() {
            tracing::debug!("detected parent shell {}", shell.program.display());
            return Ok(shell);
        }
        let default = platform_default();
        tracing::debug!("falling back to default shell {default}");
        Self::from_name(&default)
    }

    /// Arguments for an interactive session, given the directory holding a
    /// rendered launch script when the shell uses one.
    pub fn interactive_args(&self, launch_dir: Option<&Path>) -> Vec<OsString> {
        let script = |name: &str| -> Option<OsString> {
            launch_dir.map(|dir| dir.join(name).into_os_string())
        };
        let mut args: Vec<OsString> = Vec::new();
        match self.kind {
            ShellKind::Bash => {
                if let Some(rc) = script(LaunchScript::Sh.file_name()) {
                    args.push("--rcfile".into());
                    args.push(rc);
                }
                args.push("-i".into());
            }
            ShellKind::Sh | ShellKind::Ksh | ShellKind::Zsh | ShellKind::Csh | ShellKind::Tcsh => {
                // startup files are injected through ENV / ZDOTDIR
                args.push("-i".into());
            }
            ShellKind::Fish => {
                args.push("-i".into());
                if let Some(init) = script(LaunchScript::Fish.file_name()) {
                    let mut source = OsString::from("source ");
                    source.push(quote_for_fish(&init));
                    args.push("-C".into());
                    args.push(source);
                }
            }
            ShellKind::Cmd => {
                args.push("/Q".into());
                args.push("/K".into());
                args.extend(script(LaunchScript::Bat.file_name()));
            }
            ShellKind::PowerShell | ShellKind::Pwsh => {
                args.push("-NoExit".into());
                args.push("-NoLogo".into());
                if let Some(ps1) = script(LaunchScript::Ps1.file_name()) {
                    args.push("-File".into());
                    args.push(ps1);
                }
            }
            ShellKind::Xonsh => {
                args.push("-i".into());
                if let Some(rc) = script(LaunchScript::Xsh.file_name()) {
                    args.push("--rc".into());
                    args.push(rc);
                }
            }
        }
        args
    }

    /// Extra environment variables an interactive session needs to pick up
    /// its launch script.
    pub fn interactive_env(&self, launch_dir: &Path) -> Vec<(String, OsString)> {
        match self.kind {
            ShellKind::Sh | ShellKind::Ksh => vec![(
                "ENV".to_string(),
                launch_dir.join(LaunchScript::Sh.file_name()).into_os_string(),
            )],
            ShellKind::Zsh => vec![("ZDOTDIR".to_string(), launch_dir.as_os_str().to_owned())],
            _ => Vec::new(),
        }
    }

    /// The launch script injecting the prompt into an interactive session.
    pub fn interactive_script(&self) -> Option<LaunchScript> {
        match self.kind {
            ShellKind::Sh | ShellKind::Bash | ShellKind::Ksh => Some(LaunchScript::Sh),
            ShellKind::Zsh => Some(LaunchScript::Zsh),
            ShellKind::Fish => Some(LaunchScript::Fish),
            ShellKind::Cmd => Some(LaunchScript::Bat),
            ShellKind::PowerShell | ShellKind::Pwsh => Some(LaunchScript::Ps1),
            ShellKind::Xonsh => Some(LaunchScript::Xsh),
            // csh has no startup file override, the session keeps its prompt
            ShellKind::Csh | ShellKind::Tcsh => None,
        }
    }
}

/// Launch script templates shipped with the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchScript {
    Sh,
    Zsh,
    Fish,
    Bat,
    RunBat,
    Ps1,
    Xsh,
}

impl LaunchScript {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Sh => "up.sh",
            Self::Zsh => ".zshrc",
            Self::Fish => "up.fish",
            Self::Bat => "up.bat",
            Self::RunBat => "run.bat",
            Self::Ps1 => "up.ps1",
            Self::Xsh => "up.xsh",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Self::Sh => include_str!("./templates/up.sh"),
            Self::Zsh => include_str!("./templates/up.zsh"),
            Self::Fish => include_str!("./templates/up.fish"),
            Self::Bat => include_str!("./templates/up.bat"),
            Self::RunBat => include_str!("./templates/run.bat"),
            Self::Ps1 => include_str!("./templates/up.ps1"),
            Self::Xsh => include_str!("./templates/up.xsh"),
        }
    }
}

fn quote_for_fish(path: &std::ffi::OsStr) -> OsString {
    let text = path.to_string_lossy().replace('\\', "\\\\").replace('\'', "\\'");
    OsString::from(format!("'{text}'"))
}

/// Walk up the process tree looking for a known shell.
fn probe_parent_shell() -> Option<Shell> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut pid = sysinfo::get_current_pid().ok()?;
    for _ in 0..MAX_PROBE_DEPTH {
        let parent = system.process(pid)?.parent()?;
        let process = system.process(parent)?;
        let name = process.name().to_string_lossy();
        if let Some(kind) = ShellKind::from_name(&name) {
            let program = process
                .exe()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(kind.as_str()));
            return Some(Shell { kind, program });
        }
        pid = parent;
    }
    None
}

/// `$SHELL` on unix, `%COMSPEC%` on windows.
pub fn platform_default() -> String {
    if cfg!(windows) {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}
