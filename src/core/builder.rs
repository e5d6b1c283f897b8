//! Purpose: Produce the unice68 shared library from source with the make toolchain.
//! Exports: `Builder`, `BuildCommand`, `CommandOutput`, `CommandRunner`, `ProcessRunner`.
//! Role: Invoked by the locator when no prebuilt library is found.
//! Invariants: Every failure is `ErrorKind::Build`; the locator decides how to recover.
//! Invariants: Artifacts appear in the output directory only after the tool reports success.
//! Invariants: Each build gets its own staging directory, removed on every exit path.
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::core::config::BuildConfig;
use crate::core::error::{Error, ErrorKind};

const MAKEFILE: &str = "Makefile";
const STAGING_PREFIX: &str = ".unice68-build-";
const STDERR_TAIL_LINES: usize = 8;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs an external build command; the seam tests replace.
pub trait CommandRunner {
    fn run(&self, command: &BuildCommand, working_dir: &Path) -> io::Result<CommandOutput>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &BuildCommand, working_dir: &Path) -> io::Result<CommandOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(working_dir)
            .output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

pub struct Builder<'a> {
    config: &'a BuildConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a BuildConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &BuildConfig {
        self.config
    }

    pub fn build(&self, source_dir: &Path, output_dir: &Path) -> Result<PathBuf, Error> {
        let makefile = source_dir.join(MAKEFILE);
        if !makefile.is_file() {
            return Err(Error::new(ErrorKind::Build)
                .with_message("no Makefile in source directory")
                .with_path(source_dir));
        }
        let makefile = fs::canonicalize(&makefile).map_err(|err| build_io(err, &makefile))?;

        fs::create_dir_all(output_dir).map_err(|err| build_io(err, output_dir))?;
        let output_dir = fs::canonicalize(output_dir).map_err(|err| build_io(err, output_dir))?;
        let staging = staging_dir(&output_dir)?;

        let command = self.command(&makefile, staging.path());
        info!(command = %command, "building unice68");
        let output = self
            .runner
            .run(&command, staging.path())
            .map_err(|err| {
                Error::new(ErrorKind::Build)
                    .with_message(format!("failed to run `{}`", command.program))
                    .with_hint("Install make and a C compiler, or set MAKE/CC.")
                    .with_source(err)
            })?;
        debug!(
            status = ?output.status,
            stdout = %String::from_utf8_lossy(&output.stdout),
            "build tool finished"
        );

        if !output.success() {
            let mut err = Error::new(ErrorKind::Build).with_message(format!(
                "`{}` failed: {}",
                command.program,
                stderr_tail(&output.stderr)
            ));
            if let Some(code) = output.status {
                err = err.with_code(code);
            }
            return Err(err);
        }

        let artifact = staging.path().join(&self.config.libname);
        if !artifact.is_file() {
            return Err(Error::new(ErrorKind::Build)
                .with_message("build reported success but produced no library")
                .with_path(artifact));
        }

        let dest = output_dir.join(&self.config.libname);
        fs::rename(&artifact, &dest).map_err(|err| build_io(err, &dest))?;
        info!(path = %dest.display(), "built unice68");
        Ok(dest)
    }

    pub fn command(&self, makefile: &Path, staging: &Path) -> BuildCommand {
        let mut args = vec![
            "-Bf".to_string(),
            makefile.display().to_string(),
            "-C".to_string(),
            staging.display().to_string(),
        ];
        args.extend(self.config.make_variables());
        BuildCommand {
            program: self.config.make.clone(),
            args,
        }
    }
}

/// Unique per call; the directory is deleted when the handle drops.
fn staging_dir(output_dir: &Path) -> Result<TempDir, Error> {
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(output_dir)
        .map_err(|err| build_io(err, output_dir))
}

fn build_io(err: io::Error, path: &Path) -> Error {
    Error::new(ErrorKind::Build)
        .with_message("filesystem error during build")
        .with_path(path)
        .with_source(err)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.is_empty() {
        return "no output".to_string();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
