//! Purpose: Find or produce a usable unice68 shared library.
//! Exports: `Locator`, `Lookup`, `BuildRequest`, `SystemLibraries`, `DynamicLoaderSearch`.
//! Role: Resolution pipeline: scan search dirs → build from source → platform loader search.
//! Invariants: A prebuilt match short-circuits; the builder is never invoked when one exists.
//! Invariants: Build failures are recovered from; they surface only as the source of `LibraryNotFound`.
//! Invariants: Scanning is read-only and deterministic for an unchanged filesystem.
use std::path::PathBuf;

use libloading::Library;
use tracing::{debug, info, warn};

use crate::core::builder::{Builder, CommandRunner};
use crate::core::config::{BuildConfig, LocatorConfig};
use crate::core::error::{Error, ErrorKind};
use crate::core::platform::{LIB_BASE, LibraryDescriptor, LibraryLocation, ResolvedLibrary};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildRequest {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub libname: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Lookup {
    Found(PathBuf),
    BuildRequest(BuildRequest),
}

/// Resolves bare library names through the platform's loader search path.
pub trait SystemLibraries {
    fn find(&self, candidates: &[String]) -> Option<String>;
}

/// Probes candidates with the dynamic loader (`dlopen`/`LoadLibrary`) by bare name.
#[derive(Clone, Copy, Debug, Default)]
pub struct DynamicLoaderSearch;

impl SystemLibraries for DynamicLoaderSearch {
    fn find(&self, candidates: &[String]) -> Option<String> {
        for name in candidates {
            if name.contains(['/', '\\']) {
                continue;
            }
            // SAFETY: same trust model as binding; only unice68 candidate names are probed.
            match unsafe { Library::new(name.as_str()) } {
                Ok(library) => {
                    drop(library);
                    return Some(name.clone());
                }
                Err(err) => debug!(candidate = %name, error = %err, "not on loader path"),
            }
        }
        None
    }
}

pub struct Locator<'a> {
    config: &'a LocatorConfig,
    build: &'a BuildConfig,
    runner: &'a dyn CommandRunner,
    system: &'a dyn SystemLibraries,
}

impl<'a> Locator<'a> {
    pub fn new(
        config: &'a LocatorConfig,
        build: &'a BuildConfig,
        runner: &'a dyn CommandRunner,
        system: &'a dyn SystemLibraries,
    ) -> Self {
        Self {
            config,
            build,
            runner,
            system,
        }
    }

    pub fn descriptor(&self) -> LibraryDescriptor {
        LibraryDescriptor::new(self.config.platform, self.config.libname_override.as_deref())
    }

    /// Scan the search directories; yields a build request when nothing matches.
    pub fn scan(&self, descriptor: &LibraryDescriptor) -> Lookup {
        for dir in self.config.search_dirs() {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "search directory missing");
                continue;
            }
            for name in descriptor.candidates() {
                let path = dir.join(name);
                if path.is_file() {
                    debug!(path = %path.display(), "found prebuilt library");
                    return Lookup::Found(path);
                }
            }
        }
        Lookup::BuildRequest(BuildRequest {
            source_dir: self.config.source_dir.clone(),
            output_dir: self.config.lib_dir.clone(),
            libname: descriptor.primary().to_string(),
        })
    }

    pub fn resolve(&self) -> Result<ResolvedLibrary, Error> {
        let descriptor = self.descriptor();
        if let Some(name) = &self.config.libname_override {
            if !name.contains(LIB_BASE) {
                warn!(libname = %name, "LIBNAME does not mention {LIB_BASE}");
            }
        }

        let request = match self.scan(&descriptor) {
            Lookup::Found(path) => {
                info!(path = %path.display(), "using prebuilt unice68");
                return Ok(descriptor.resolve(LibraryLocation::Prebuilt(path)));
            }
            Lookup::BuildRequest(request) => request,
        };

        let build_config = BuildConfig {
            libname: request.libname.clone(),
            ..self.build.clone()
        };
        let build_err = match Builder::new(&build_config, self.runner)
            .build(&request.source_dir, &request.output_dir)
        {
            Ok(path) => return Ok(descriptor.resolve(LibraryLocation::Built(path))),
            Err(err) => {
                warn!(error = %err, "building unice68 failed; trying system libraries");
                err
            }
        };

        if let Some(name) = self.system.find(descriptor.candidates()) {
            info!(library = %name, "using system unice68");
            return Ok(descriptor.resolve(LibraryLocation::System(name)));
        }

        let dirs = self
            .config
            .search_dirs()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::new(ErrorKind::LibraryNotFound)
            .with_message(format!(
                "no usable {LIB_BASE} library in [{dirs}] or on the system loader path (tried: {})",
                descriptor.candidates().join(", ")
            ))
            .with_path(&self.config.lib_dir)
            .with_hint(format!(
                "Set UNICE68_LIB_DIR or LIBNAME, or point UNICE68_SRC_DIR at the {LIB_BASE} sources."
            ))
            .with_source(build_err))
    }
}
