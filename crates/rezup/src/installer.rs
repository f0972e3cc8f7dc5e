// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Building the environment of a local revision.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::manifest::{SharedLib, Tool};
use crate::{Error, Manifest, Result, Revision};

#[cfg(test)]
#[path = "./installer_test.rs"]
mod installer_test;

/// Directory under a revision holding one sub-environment per name.
pub const VENV_DIRNAME: &str = "venv";
/// Directory under a revision holding the production entry points.
pub const PRODUCTION_BIN_DIRNAME: &str = "bin";
/// Written last into a shared lib directory, lists what it was built from.
pub const SHARED_MARKER_FILENAME: &str = ".rezup-requires";

const PURELIB_QUERY: &str = "import sysconfig; print(sysconfig.get_paths()['purelib'])";
const CONSOLE_SCRIPTS_QUERY: &str = "import sys, importlib.metadata as m; \
     [print(e.name) for e in m.distribution(sys.argv[1]).entry_points \
     if e.group == 'console_scripts']";

/// Builds the runnable environment of a local revision.
///
/// Called once per local revision, after its metadata exists and before its
/// manifest snapshot is written. An error leaves the revision unpublished.
pub trait Installer: Send + Sync {
    fn install(&self, revision: &Revision, manifest: &Manifest) -> Result<()>;
}

/// Directory of executables inside a sub-environment.
pub fn venv_bin_dir(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv_bin_dir(venv).join("python.exe")
    } else {
        venv_bin_dir(venv).join("python")
    }
}

/// File name and content of the production entry point for `script`.
///
/// The wrapper runs the sub-environment's script with an isolated
/// interpreter (`-E`) so only the tool's own commands end up on `PATH`.
pub fn production_script(venv: &Path, script: &str) -> (String, String) {
    let python = venv_python(venv);
    if cfg!(windows) {
        let target = venv_bin_dir(venv).join(format!("{script}-script.py"));
        let exe = venv_bin_dir(venv).join(format!("{script}.exe"));
        let content = format!(
            "@echo off\r\nif exist \"{target}\" (\r\n  \"{python}\" -E \"{target}\" %*\r\n) else (\r\n  \"{exe}\" %*\r\n)\r\nexit /b %ERRORLEVEL%\r\n",
            target = target.display(),
            python = python.display(),
            exe = exe.display(),
        );
        (format!("{script}.cmd"), content)
    } else {
        let target = venv_bin_dir(venv).join(script);
        let content = format!(
            "#!/bin/sh\nexec \"{}\" -E \"{}\" \"$@\"\n",
            python.display(),
            target.display()
        );
        (script.to_string(), content)
    }
}

/// Whether `target` holds a complete install of exactly `shared.requires`.
pub fn shared_is_current(shared: &SharedLib, target: &Path) -> bool {
    std::fs::read_to_string(target.join(SHARED_MARKER_FILENAME))
        .is_ok_and(|recorded| recorded == shared_marker(shared))
}

fn shared_marker(shared: &SharedLib) -> String {
    let mut requires = shared.requires.clone();
    requires.sort();
    requires.iter().map(|r| format!("{r}\n")).collect()
}

/// Installs tools with `python -m venv` and `pip`.
///
/// The primary tool gets its own sub-environment, non-isolated extensions
/// are installed next to it and every isolated extension gets a
/// sub-environment holding the primary tool and itself. The console scripts
/// of every tool are exposed through wrappers in the revision's `bin`.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    /// Interpreter used when a tool has no override.
    pub python: String,
}

impl Default for PipInstaller {
    fn default() -> Self {
        let python = if cfg!(windows) { "python" } else { "python3" };
        Self {
            python: python.to_string(),
        }
    }
}

impl PipInstaller {
    /// Interpreter for a tool. A bare version such as `3.9` becomes
    /// `python3.9`.
    pub fn interpreter_for(&self, tool: &Tool) -> String {
        match tool.python.as_deref() {
            Some(v) if !v.is_empty() && v.chars().all(|c| c.is_ascii_digit() || c == '.') => {
                format!("python{v}")
            }
            Some(python) if !python.is_empty() => python.to_string(),
            _ => self.python.clone(),
        }
    }

    pub fn venv_command(&self, tool: &Tool, dst: &Path) -> Vec<OsString> {
        vec![
            self.interpreter_for(tool).into(),
            "-m".into(),
            "venv".into(),
            dst.as_os_str().to_owned(),
        ]
    }

    pub fn pip_install_command(&self, tool: &Tool, venv: &Path) -> Vec<OsString> {
        let mut cmd: Vec<OsString> = vec![
            venv_python(venv).into_os_string(),
            "-m".into(),
            "pip".into(),
            "install".into(),
        ];
        if tool.edit {
            cmd.push("--editable".into());
        }
        cmd.push(tool.url.as_str().into());
        cmd.push("--disable-pip-version-check".into());
        cmd
    }

    pub fn shared_install_command(
        &self,
        shared: &SharedLib,
        venv: &Path,
        target: &Path,
    ) -> Vec<OsString> {
        let mut cmd: Vec<OsString> = vec![
            venv_python(venv).into_os_string(),
            "-m".into(),
            "pip".into(),
            "install".into(),
            "--target".into(),
            target.as_os_str().to_owned(),
        ];
        cmd.extend(shared.requires.iter().map(OsString::from));
        cmd.push("--disable-pip-version-check".into());
        cmd
    }

    fn run(&self, tool: &str, cmd: &[OsString]) -> Result<()> {
        let Some((program, args)) = cmd.split_first() else {
            return Ok(());
        };
        let command_line = cmd
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!("running {command_line}");

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|error| Error::LaunchFailed {
                program: program.to_string_lossy().into_owned(),
                error,
            })?;
        if !status.success() {
            return Err(Error::InstallFailed {
                tool: tool.to_string(),
                command: command_line,
                code: status.code(),
            });
        }
        Ok(())
    }

    /// Run `python -c <query> [args]` in a sub-environment and return stdout.
    fn query(&self, tool: &str, venv: &Path, query: &str, args: &[&str]) -> Result<String> {
        let python = venv_python(venv);
        let output = Command::new(&python)
            .arg("-c")
            .arg(query)
            .args(args)
            .output()
            .map_err(|error| Error::LaunchFailed {
                program: python.display().to_string(),
                error,
            })?;
        if !output.status.success() {
            return Err(Error::InstallFailed {
                tool: tool.to_string(),
                command: format!("{} -c {query:?} {}", python.display(), args.join(" ")),
                code: output.status.code(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn create_venv(&self, tool: &Tool, venv_root: &Path) -> Result<PathBuf> {
        let dst = venv_root.join(&tool.name);
        self.run(&tool.name, &self.venv_command(tool, &dst))?;
        Ok(dst)
    }

    fn install_tool(&self, tool: &Tool, venv: &Path) -> Result<()> {
        tracing::info!("Installing {}..", tool.name);
        self.run(&tool.name, &self.pip_install_command(tool, venv))
    }

    /// Write wrappers for the console scripts of `tool` into `bin_dir`.
    fn expose_scripts(&self, tool: &Tool, venv: &Path, bin_dir: &Path) -> Result<()> {
        let scripts = self.query(&tool.name, venv, CONSOLE_SCRIPTS_QUERY, &[&tool.name])?;
        std::fs::create_dir_all(bin_dir).map_err(|error| Error::WriteFailed {
            path: bin_dir.to_path_buf(),
            error,
        })?;
        for script in scripts.lines().map(str::trim).filter(|s| !s.is_empty()) {
            let (file_name, content) = production_script(venv, script);
            let path = bin_dir.join(file_name);
            tracing::debug!("writing production script {}", path.display());
            write_executable(&path, &content)?;
        }
        Ok(())
    }

    fn install_shared(&self, shared: &SharedLib, venv: &Path, target: &Path) -> Result<()> {
        if shared_is_current(shared, target) {
            tracing::debug!("shared lib {} already installed", shared.name);
            return Ok(());
        }
        if target.exists() {
            tracing::info!("rebuilding stale shared lib {}", target.display());
            std::fs::remove_dir_all(target).map_err(|error| Error::WriteFailed {
                path: target.to_path_buf(),
                error,
            })?;
        }
        tracing::info!("Installing shared lib {}..", shared.name);
        self.run(&shared.name, &self.shared_install_command(shared, venv, target))?;

        let marker = target.join(SHARED_MARKER_FILENAME);
        std::fs::write(&marker, shared_marker(shared))
            .map_err(|error| Error::WriteFailed { path: marker, error })
    }

    /// Make `lib_dir` importable from `venv` through a `.pth` file.
    fn link_shared(&self, shared: &SharedLib, venv: &Path, lib_dir: &Path) -> Result<()> {
        let site_packages = self.query(&shared.name, venv, PURELIB_QUERY, &[])?;
        let pth = PathBuf::from(site_packages.trim()).join(format!("{}.pth", shared.name));
        std::fs::write(&pth, format!("{}\n", lib_dir.display()))
            .map_err(|error| Error::WriteFailed { path: pth, error })
    }
}

impl Installer for PipInstaller {
    fn install(&self, revision: &Revision, manifest: &Manifest) -> Result<()> {
        let venv_root = revision.path().join(VENV_DIRNAME);
        let bin_dir = revision.path().join(PRODUCTION_BIN_DIRNAME);
        let primary = &manifest.rez;

        let primary_venv = self.create_venv(primary, &venv_root)?;
        self.install_tool(primary, &primary_venv)?;
        self.expose_scripts(primary, &primary_venv, &bin_dir)?;
        let mut venvs = vec![primary_venv.clone()];

        for tool in &manifest.extension {
            let venv = if tool.isolation {
                let venv = self.create_venv(tool, &venv_root)?;
                self.install_tool(primary, &venv)?;
                self.install_tool(tool, &venv)?;
                venvs.push(venv.clone());
                venv
            } else {
                self.install_tool(tool, &primary_venv)?;
                primary_venv.clone()
            };
            self.expose_scripts(tool, &venv, &bin_dir)?;
        }

        if let Some(shared) = &manifest.shared {
            let lib_dir = revision.container().libs_path().join(&shared.name);
            self.install_shared(shared, &primary_venv, &lib_dir)?;
            for venv in &venvs {
                self.link_shared(shared, venv, &lib_dir)?;
            }
        }

        Ok(())
    }
}

fn write_executable(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|error| Error::WriteFailed {
        path: path.to_path_buf(),
        error,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(
            |error| Error::WriteFailed {
                path: path.to_path_buf(),
                error,
            },
        )?;
    }
    Ok(())
}
