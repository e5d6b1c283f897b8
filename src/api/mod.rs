//! Purpose: Define the stable public Rust API boundary for icepack.
//! Exports: Codec, resolution and configuration types needed by the CLI and library users.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path to the core primitives.

mod loader;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::builder::{BuildCommand, Builder, CommandOutput, CommandRunner, ProcessRunner};
pub use crate::core::config::{BuildConfig, CodecOptions, LocatorConfig};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::locate::{BuildRequest, DynamicLoaderSearch, Locator, Lookup, SystemLibraries};
pub use crate::core::platform::{
    LIB_BASE, LibraryDescriptor, LibraryLocation, Platform, ResolvedLibrary,
};
pub use crate::core::unice68::header::{ICE_HEADER_LEN, IceHeader};
pub use crate::core::unice68::sys::{EntryPoints, NativeLibrary, SYMBOLS};
pub use crate::core::unice68::{Icepack, PackLayout, max_packed_size};
pub use loader::{ApiResult, LoadOptions, load, open, resolve};
