//! Purpose: Platform tags and the library-name table for unice68.
//! Exports: `Platform`, `LibraryDescriptor`, `ResolvedLibrary`, `LibraryLocation`, `LIB_BASE`.
//! Role: Single source of candidate filenames used by the locator and builder.
//! Invariants: Candidate lists are ordered most-specific first and never empty.
//! Invariants: A descriptor becomes a `ResolvedLibrary` exactly once; the location is immutable.
use std::fmt;
use std::path::{Path, PathBuf};

pub const LIB_BASE: &str = "unice68";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(any(target_os = "macos", target_os = "ios")) {
            Platform::Darwin
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Windows => "windows",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "linux" | "android" => Some(Platform::Linux),
            "darwin" | "macos" | "ios" => Some(Platform::Darwin),
            "windows" | "win32" => Some(Platform::Windows),
            _ => None,
        }
    }

    /// `(prefix, extension)` pairs for shared libraries, most specific first.
    fn naming(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Platform::Linux => &[("lib", "so")],
            Platform::Darwin => &[("lib", "dylib"), ("lib", "so")],
            Platform::Windows => &[("", "dll"), ("lib", "dll")],
        }
    }

    pub fn library_filename(self, base: &str) -> String {
        let (prefix, ext) = self.naming()[0];
        format!("{prefix}{base}.{ext}")
    }

    pub fn library_filenames(self, base: &str) -> Vec<String> {
        self.naming()
            .iter()
            .map(|(prefix, ext)| format!("{prefix}{base}.{ext}"))
            .collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LibraryDescriptor {
    platform: Platform,
    candidates: Vec<String>,
}

impl LibraryDescriptor {
    pub fn new(platform: Platform, libname_override: Option<&str>) -> Self {
        let mut candidates = Vec::new();
        if let Some(name) = libname_override.filter(|name| !name.is_empty()) {
            candidates.push(name.to_string());
        }
        for name in platform.library_filenames(LIB_BASE) {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        Self {
            platform,
            candidates,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Filename the builder should produce: the override if any, else the platform default.
    pub fn primary(&self) -> &str {
        &self.candidates[0]
    }

    pub fn resolve(self, location: LibraryLocation) -> ResolvedLibrary {
        ResolvedLibrary {
            descriptor: self,
            location,
        }
    }
}

/// Where a usable library was found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LibraryLocation {
    /// A prebuilt file in one of the search directories.
    Prebuilt(PathBuf),
    /// A file produced by the builder.
    Built(PathBuf),
    /// A bare name resolved through the platform's loader search path.
    System(String),
}

impl LibraryLocation {
    pub fn source(&self) -> &'static str {
        match self {
            LibraryLocation::Prebuilt(_) => "prebuilt",
            LibraryLocation::Built(_) => "built",
            LibraryLocation::System(_) => "system",
        }
    }

    pub fn file(&self) -> Option<&Path> {
        match self {
            LibraryLocation::Prebuilt(path) | LibraryLocation::Built(path) => Some(path),
            LibraryLocation::System(_) => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            LibraryLocation::Prebuilt(path) | LibraryLocation::Built(path) => {
                path.display().to_string()
            }
            LibraryLocation::System(name) => name.clone(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedLibrary {
    descriptor: LibraryDescriptor,
    location: LibraryLocation,
}

impl ResolvedLibrary {
    pub fn descriptor(&self) -> &LibraryDescriptor {
        &self.descriptor
    }

    pub fn location(&self) -> &LibraryLocation {
        &self.location
    }

    pub fn platform(&self) -> Platform {
        self.descriptor.platform
    }
}
