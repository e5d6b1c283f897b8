//! Purpose: Hold top-level CLI command dispatch for `icepack`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: The native library is resolved only by commands that need it.

use super::*;

use clap::CommandFactory;
use icepack::api::{self, Icepack, LibraryLocation, LoadOptions, ResolvedLibrary, SYMBOLS};

pub(super) fn dispatch_command(command: Command, global: GlobalArgs) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "icepack", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Pack {
            input,
            output,
            max_size,
        } => {
            let data = read_input(&input)?;
            let ice = load_codec(&global)?;
            let packed = match max_size {
                Some(max_size) => ice.pack_with_capacity(&data, max_size)?,
                None => ice.pack(&data)?,
            };
            write_output(output.as_deref(), &packed)?;
            Ok(RunOutcome::ok())
        }
        Command::Depack { input, output } => {
            let data = read_input(&input)?;
            let ice = load_codec(&global)?;
            let depacked = ice.depack(&data)?;
            write_output(output.as_deref(), &depacked)?;
            Ok(RunOutcome::ok())
        }
        Command::Info { input } => {
            let data = read_input(&input)?;
            let ice = load_codec(&global)?;
            let (depacked, packed) = ice.depacked_size(&data)?;
            let ratio = if depacked == 0 {
                Value::Null
            } else {
                json!((packed as f64 * 1000.0 / depacked as f64).round() / 10.0)
            };
            emit_json(json!({
                "input": input.display().to_string(),
                "packed_size": packed,
                "depacked_size": depacked,
                "ratio_percent": ratio,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Locate { check } => {
            let options = load_options(&global);
            let resolved = api::resolve(&options)?;
            let mut report = locate_json(&resolved);
            if check {
                let ice = api::open(&resolved, options.codec)?;
                report["symbols"] = json!(SYMBOLS);
                ice.unload()?;
            }
            emit_json(report);
            Ok(RunOutcome::ok())
        }
    }
}

fn load_options(global: &GlobalArgs) -> LoadOptions {
    let mut options = LoadOptions::from_env();
    if let Some(lib_dir) = &global.lib_dir {
        options = options.with_lib_dir(lib_dir);
    }
    if let Some(src_dir) = &global.src_dir {
        options = options.with_source_dir(src_dir);
    }
    options
}

fn load_codec(global: &GlobalArgs) -> Result<Icepack, Error> {
    api::load(&load_options(global))
}

fn locate_json(resolved: &ResolvedLibrary) -> Value {
    let location = resolved.location();
    let path = match location {
        LibraryLocation::Prebuilt(path) | LibraryLocation::Built(path) => {
            json!(path.display().to_string())
        }
        LibraryLocation::System(_) => Value::Null,
    };
    json!({
        "platform": resolved.platform().as_str(),
        "source": location.source(),
        "library": location.display_name(),
        "path": path,
        "candidates": resolved.descriptor().candidates(),
    })
}
