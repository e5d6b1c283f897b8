//! Purpose: `icepack` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON or raw bytes on stdout.
//! Invariants: `pack`/`depack` write only payload bytes to stdout; diagnostics go to stderr.
//! Invariants: Errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use icepack::api::{Error, ErrorKind, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `icepack --help` for usage."));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command, cli.global)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "icepack",
    version,
    about = "Pack and depack ICE! data through the native unice68 library",
    long_about = None,
    after_help = r#"EXAMPLES
  $ icepack pack song.sndh -o song.ice
  $ icepack info song.ice
  $ icepack depack song.ice > song.sndh
  $ icepack locate

ENVIRONMENT
  UNICE68_LIB_DIR   Directory searched first and used as build output (default: ~/.icepack/lib)
  UNICE68_LIB_PATH  Extra directories to search
  UNICE68_SRC_DIR   unice68 sources with a Makefile (default: ./unice68)
  LIBNAME           Library filename to look for and build
  MAKE, CC, CFLAGS  Toolchain used when the library must be built
  RUST_LOG          Log filter for diagnostics on stderr (default: warn)"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone, Debug)]
struct GlobalArgs {
    #[arg(
        long,
        global = true,
        help = "Directory holding (or receiving) the unice68 shared library",
        value_hint = ValueHint::DirPath
    )]
    lib_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "unice68 source directory used when the library must be built",
        value_hint = ValueHint::DirPath
    )]
    src_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Pack a file (use - for stdin)")]
    Pack {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(short, long, help = "Output file (default: stdout)", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        #[arg(long, help = "Capacity declared to the packer (default: 16 + len*9/8)")]
        max_size: Option<usize>,
    },
    #[command(about = "Depack an ICE! file (use - for stdin)")]
    Depack {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(short, long, help = "Output file (default: stdout)", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    #[command(about = "Report packed and depacked sizes of an ICE! file as JSON")]
    Info {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
    },
    #[command(about = "Resolve the native library (building it if needed) and report where it is")]
    Locate {
        #[arg(long, help = "Also load the library and check its entry points")]
        check: bool,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn read_input(path: &Path) -> Result<Vec<u8>, Error> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read stdin")
                .with_source(err)
        })?;
        return Ok(buf);
    }
    fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read input")
            .with_path(path)
            .with_source(err)
    })
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<(), Error> {
    match path {
        Some(path) if path != Path::new("-") => fs::write(path, bytes).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_path(path)
                .with_source(err)
        }),
        _ => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|_| stdout.flush())
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write stdout")
                        .with_source(err)
                })
        }
    }
}

fn emit_json(value: Value) {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    println!("{text}");
}

fn emit_error(err: &Error) {
    eprintln!("{}", error_json(err));
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().as_str()));
    inner.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(code) = err.code() {
        inner.insert("code".to_string(), json!(code));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    json!({ "error": Value::Object(inner) })
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = StdError::source(err);
    while let Some(source) = current {
        causes.push(source.to_string());
        current = source.source();
    }
    causes
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

#[cfg(test)]
mod tests {
    use super::{error_causes, error_json};
    use icepack::api::{Error, ErrorKind};
    use std::io;

    #[test]
    fn error_json_carries_context() {
        let err = Error::new(ErrorKind::LibraryNotFound)
            .with_message("no usable unice68 library")
            .with_path("/opt/lib")
            .with_hint("Set UNICE68_LIB_DIR.")
            .with_source(Error::new(ErrorKind::Build).with_code(2));
        let value = error_json(&err);
        let inner = &value["error"];
        assert_eq!(inner["kind"], "LibraryNotFound");
        assert_eq!(inner["path"], "/opt/lib");
        assert_eq!(inner["hint"], "Set UNICE68_LIB_DIR.");
        assert_eq!(inner["causes"][0], "Build (code: 2)");
    }

    #[test]
    fn causes_follow_the_chain() {
        let err = Error::new(ErrorKind::Io)
            .with_source(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(error_causes(&err), ["denied"]);
    }
}
