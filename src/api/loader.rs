//! Purpose: One initialization path from configuration to a ready `Icepack`.
//! Exports: `LoadOptions`, `resolve`, `open`, `load`.
//! Role: Wires the locator, builder, binding and codec together with the default capabilities.
//! Invariants: No global state; the caller owns the returned handle and passes it explicitly.
//! Invariants: Construction fails loudly when nothing can be resolved or bound.
use std::path::PathBuf;

use crate::core::builder::ProcessRunner;
use crate::core::config::{BuildConfig, CodecOptions, LocatorConfig};
use crate::core::error::Error;
use crate::core::locate::{DynamicLoaderSearch, Locator};
use crate::core::platform::ResolvedLibrary;
use crate::core::unice68::Icepack;
use crate::core::unice68::sys::NativeLibrary;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub locator: LocatorConfig,
    pub build: BuildConfig,
    pub codec: CodecOptions,
}

impl LoadOptions {
    pub fn from_env() -> Self {
        let locator = LocatorConfig::from_env();
        let build = BuildConfig::from_env(locator.platform);
        Self {
            locator,
            build,
            codec: CodecOptions::default(),
        }
    }

    pub fn with_lib_dir(mut self, lib_dir: impl Into<PathBuf>) -> Self {
        self.locator = self.locator.with_lib_dir(lib_dir);
        self
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.locator = self.locator.with_source_dir(source_dir);
        self
    }

    pub fn with_codec(mut self, codec: CodecOptions) -> Self {
        self.codec = codec;
        self
    }
}

/// Locate (or build) the library without loading it.
pub fn resolve(options: &LoadOptions) -> ApiResult<ResolvedLibrary> {
    Locator::new(
        &options.locator,
        &options.build,
        &ProcessRunner,
        &DynamicLoaderSearch,
    )
    .resolve()
}

/// Bind an already resolved library.
pub fn open(resolved: &ResolvedLibrary, codec: CodecOptions) -> ApiResult<Icepack> {
    let native = NativeLibrary::open(resolved.location())?;
    Ok(Icepack::with_options(native, codec))
}

pub fn load(options: &LoadOptions) -> ApiResult<Icepack> {
    let resolved = resolve(options)?;
    open(&resolved, options.codec)
}

#[cfg(test)]
mod tests {
    use super::{LoadOptions, load};
    use crate::core::config::{BuildConfig, CodecOptions, LocatorConfig};
    use crate::core::error::ErrorKind;
    use crate::core::platform::Platform;
    use std::fs;

    #[test]
    fn unloadable_prebuilt_fails_construction() {
        let temp = tempfile::tempdir().expect("tempdir");
        let platform = Platform::current();
        let no_env = |_: &str| -> Option<String> { None };
        let options = LoadOptions {
            locator: LocatorConfig::from_lookup(platform, &no_env),
            build: BuildConfig::from_lookup(platform, &no_env),
            codec: CodecOptions::default(),
        }
        .with_lib_dir(temp.path())
        .with_source_dir(temp.path().join("missing-src"));
        assert!(options.locator.extra_dirs.is_empty());
        assert!(options.locator.libname_override.is_none());
        let name = platform.library_filename("unice68");
        fs::write(temp.path().join(name), b"not a library").expect("write");

        let err = load(&options).expect_err("bind fails");
        assert_eq!(err.kind(), ErrorKind::Bind);
    }
}
