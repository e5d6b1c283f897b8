//! Purpose: Resolve build, locator and codec settings from defaults and the environment.
//! Exports: `BuildConfig`, `LocatorConfig`, `CodecOptions`, `EnvLookup`, `process_env`.
//! Role: One place where `CC`, `CFLAGS`, `LIBNAME`, `MAKE` and `UNICE68_*` are read.
//! Invariants: Settings are resolved once and treated as read-only afterwards.
//! Invariants: Environment access goes through an injectable lookup so tests never mutate it.
use std::env;
use std::path::PathBuf;

use crate::core::platform::{LIB_BASE, Platform};

pub const DEFAULT_CC: &str = "cc";
pub const DEFAULT_CFLAGS: &str = "-O2 -shared -DNDEBUG=1";
pub const DEFAULT_MAKE: &str = "make";

pub const ENV_CC: &str = "CC";
pub const ENV_CFLAGS: &str = "CFLAGS";
pub const ENV_LIBNAME: &str = "LIBNAME";
pub const ENV_MAKE: &str = "MAKE";
pub const ENV_LIB_DIR: &str = "UNICE68_LIB_DIR";
pub const ENV_LIB_PATH: &str = "UNICE68_LIB_PATH";
pub const ENV_SRC_DIR: &str = "UNICE68_SRC_DIR";

/// Environment lookup; returns `None` for unset or empty variables.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub fn process_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildConfig {
    pub make: String,
    pub cc: String,
    pub cflags: String,
    pub libname: String,
}

impl BuildConfig {
    pub fn defaults(platform: Platform) -> Self {
        Self {
            make: DEFAULT_MAKE.to_string(),
            cc: DEFAULT_CC.to_string(),
            cflags: DEFAULT_CFLAGS.to_string(),
            libname: platform.library_filename(LIB_BASE),
        }
    }

    pub fn from_env(platform: Platform) -> Self {
        Self::from_lookup(platform, &process_env)
    }

    pub fn from_lookup(platform: Platform, lookup: EnvLookup<'_>) -> Self {
        let defaults = Self::defaults(platform);
        Self {
            make: lookup(ENV_MAKE).unwrap_or(defaults.make),
            cc: lookup(ENV_CC).unwrap_or(defaults.cc),
            cflags: lookup(ENV_CFLAGS).unwrap_or(defaults.cflags),
            libname: lookup(ENV_LIBNAME).unwrap_or(defaults.libname),
        }
    }

    /// `VAR=value` assignments handed to make.
    pub fn make_variables(&self) -> [String; 3] {
        [
            format!("CC={}", self.cc),
            format!("CFLAGS={}", self.cflags),
            format!("LIBNAME={}", self.libname),
        ]
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocatorConfig {
    pub platform: Platform,
    /// Primary directory: scanned first and used as the build output directory.
    pub lib_dir: PathBuf,
    pub extra_dirs: Vec<PathBuf>,
    pub source_dir: PathBuf,
    pub libname_override: Option<String>,
}

impl LocatorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(Platform::current(), &process_env)
    }

    pub fn from_lookup(platform: Platform, lookup: EnvLookup<'_>) -> Self {
        let lib_dir = lookup(ENV_LIB_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_lib_dir(lookup));
        let extra_dirs = lookup(ENV_LIB_PATH)
            .map(|value| env::split_paths(&value).collect())
            .unwrap_or_default();
        let source_dir = lookup(ENV_SRC_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(LIB_BASE));
        Self {
            platform,
            lib_dir,
            extra_dirs,
            source_dir,
            libname_override: lookup(ENV_LIBNAME),
        }
    }

    pub fn with_lib_dir(mut self, lib_dir: impl Into<PathBuf>) -> Self {
        self.lib_dir = lib_dir.into();
        self
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = source_dir.into();
        self
    }

    pub fn with_libname(mut self, libname: Option<String>) -> Self {
        self.libname_override = libname.filter(|name| !name.is_empty());
        self
    }

    /// Search directories in scan order.
    pub fn search_dirs(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.lib_dir).chain(self.extra_dirs.iter())
    }
}

fn default_lib_dir(lookup: EnvLookup<'_>) -> PathBuf {
    let home = lookup("HOME")
        .or_else(|| lookup("USERPROFILE"))
        .unwrap_or_default();
    PathBuf::from(home).join(".icepack").join("lib")
}

/// Tunable limits for the codec's supplemental allocation and size plausibility checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CodecOptions {
    /// Fixed bytes added to every guard region.
    pub supplement_pad: usize,
    /// Guard region also grows by `capacity / supplement_divisor`.
    pub supplement_divisor: usize,
    pub max_depacked_size: usize,
    pub max_expansion_ratio: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            supplement_pad: 256,
            supplement_divisor: 8,
            max_depacked_size: 256 * 1024 * 1024,
            max_expansion_ratio: 4096,
        }
    }
}

impl CodecOptions {
    pub fn supplement_for(&self, capacity: usize) -> usize {
        let proportional = capacity
            .checked_div(self.supplement_divisor)
            .unwrap_or(0);
        proportional.saturating_add(self.supplement_pad).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildConfig, CodecOptions, LocatorConfig};
    use crate::core::platform::Platform;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn build_defaults_are_guessed_from_platform() {
        let lookup = lookup_from(&[]);
        let config = BuildConfig::from_lookup(Platform::Darwin, &lookup);
        assert_eq!(config.cc, "cc");
        assert_eq!(config.cflags, "-O2 -shared -DNDEBUG=1");
        assert_eq!(config.libname, "libunice68.dylib");
        assert_eq!(config.make, "make");
    }

    #[test]
    fn build_env_overrides_win() {
        let lookup = lookup_from(&[
            ("CC", "clang"),
            ("CFLAGS", "-O3 -shared"),
            ("LIBNAME", "libunice68-custom.so"),
            ("MAKE", "gmake"),
        ]);
        let config = BuildConfig::from_lookup(Platform::Linux, &lookup);
        assert_eq!(
            config.make_variables(),
            [
                "CC=clang".to_string(),
                "CFLAGS=-O3 -shared".to_string(),
                "LIBNAME=libunice68-custom.so".to_string(),
            ]
        );
        assert_eq!(config.make, "gmake");
    }

    #[test]
    fn locator_dirs_come_from_env() {
        let lookup = lookup_from(&[
            ("HOME", "/home/ice"),
            ("UNICE68_SRC_DIR", "/src/unice68"),
        ]);
        let config = LocatorConfig::from_lookup(Platform::Linux, &lookup);
        assert_eq!(config.lib_dir, PathBuf::from("/home/ice/.icepack/lib"));
        assert_eq!(config.source_dir, PathBuf::from("/src/unice68"));
        assert!(config.libname_override.is_none());

        let lookup = lookup_from(&[("UNICE68_LIB_DIR", "/opt/ice/lib"), ("LIBNAME", "x.so")]);
        let config = LocatorConfig::from_lookup(Platform::Linux, &lookup);
        assert_eq!(config.lib_dir, PathBuf::from("/opt/ice/lib"));
        assert_eq!(config.libname_override.as_deref(), Some("x.so"));
        assert_eq!(config.search_dirs().count(), 1);
    }

    #[test]
    fn supplement_grows_with_capacity() {
        let options = CodecOptions::default();
        assert_eq!(options.supplement_for(0), 256);
        assert_eq!(options.supplement_for(8000), 1256);

        let flat = CodecOptions {
            supplement_pad: 0,
            supplement_divisor: 0,
            ..CodecOptions::default()
        };
        assert_eq!(flat.supplement_for(100), 1);
    }
}
