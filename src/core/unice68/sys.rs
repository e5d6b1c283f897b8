// Raw unice68 entry points and the dynamically loaded library that owns them.
use std::fmt;
use std::path::Path;

use libc::{c_int, c_void};
use libloading::Library;
use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind};
use crate::core::platform::LibraryLocation;

pub const SYM_DEPACKED_SIZE: &str = "unice68_depacked_size";
pub const SYM_DEPACKER: &str = "unice68_depacker";
pub const SYM_PACKER: &str = "unice68_packer";

pub const SYMBOLS: [&str; 3] = [SYM_PACKER, SYM_DEPACKER, SYM_DEPACKED_SIZE];

/// `int unice68_depacked_size(const void *buffer, int *p_csize)`
///
/// Reads the 12-byte header unconditionally. Returns the depacked size or a
/// negative value; stores the packed size (header included) in `*p_csize`.
pub type DepackedSizeFn = unsafe extern "C" fn(buffer: *const c_void, p_csize: *mut c_int) -> c_int;

/// `int unice68_depacker(void *dst, const void *src)`
///
/// No length arguments: reads `csize` bytes of `src` and writes the depacked
/// size into `dst`, both taken from the header. Returns 0 on success.
pub type DepackerFn = unsafe extern "C" fn(dst: *mut c_void, src: *const c_void) -> c_int;

/// `int unice68_packer(void *dst, int max, const void *src, int len)`
///
/// Returns the packed length or a negative value. `max` is advisory; the
/// packer does not bound its writes by it.
pub type PackerFn =
    unsafe extern "C" fn(dst: *mut c_void, max: c_int, src: *const c_void, len: c_int) -> c_int;

#[derive(Clone, Copy)]
pub struct EntryPoints {
    pub(crate) depacked_size: DepackedSizeFn,
    pub(crate) depacker: DepackerFn,
    pub(crate) packer: PackerFn,
}

impl EntryPoints {
    /// # Safety
    ///
    /// Each function must follow the unice68 contract documented on its type and
    /// remain callable for as long as any `NativeLibrary` built from it lives.
    pub unsafe fn new(depacked_size: DepackedSizeFn, depacker: DepackerFn, packer: PackerFn) -> Self {
        Self {
            depacked_size,
            depacker,
            packer,
        }
    }
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints")
            .field(SYM_DEPACKED_SIZE, &(self.depacked_size as *const c_void))
            .field(SYM_DEPACKER, &(self.depacker as *const c_void))
            .field(SYM_PACKER, &(self.packer as *const c_void))
            .finish()
    }
}

/// Loaded unice68 library plus its bound entry points.
///
/// The entry points are copied out of the library and stay valid until the
/// library is dropped; `unload` consumes the handle so nothing can call them
/// afterwards.
pub struct NativeLibrary {
    entry: EntryPoints,
    origin: String,
    // Dropped after `entry`.
    library: Option<Library>,
}

impl NativeLibrary {
    pub fn open(location: &LibraryLocation) -> Result<Self, Error> {
        match location {
            LibraryLocation::Prebuilt(path) | LibraryLocation::Built(path) => {
                Self::open_path(path)
            }
            LibraryLocation::System(name) => Self::open_system(name),
        }
    }

    pub fn open_path(path: &Path) -> Result<Self, Error> {
        // SAFETY: loading runs the library's initializers; the locator only
        // hands us files named after unice68 from configured directories.
        let library = unsafe { Library::new(path) }.map_err(|err| {
            Error::new(ErrorKind::Bind)
                .with_message("failed to load library")
                .with_path(path)
                .with_source(err)
        })?;
        Self::bind(library, path.display().to_string())
    }

    /// Load by bare name through the platform loader's search path.
    pub fn open_system(name: &str) -> Result<Self, Error> {
        // SAFETY: as in `open_path`.
        let library = unsafe { Library::new(name) }.map_err(|err| {
            Error::new(ErrorKind::Bind)
                .with_message(format!("failed to load system library {name}"))
                .with_source(err)
        })?;
        Self::bind(library, name.to_string())
    }

    fn bind(library: Library, origin: String) -> Result<Self, Error> {
        // SAFETY: the symbol types match the unice68 C prototypes above.
        let entry = unsafe {
            EntryPoints {
                depacked_size: symbol::<DepackedSizeFn>(&library, SYM_DEPACKED_SIZE, &origin)?,
                depacker: symbol::<DepackerFn>(&library, SYM_DEPACKER, &origin)?,
                packer: symbol::<PackerFn>(&library, SYM_PACKER, &origin)?,
            }
        };
        info!(library = %origin, "bound unice68 entry points");
        Ok(Self {
            entry,
            origin,
            library: Some(library),
        })
    }

    /// Wrap entry points that are linked into the process rather than loaded.
    ///
    /// # Safety
    ///
    /// Same contract as [`EntryPoints::new`]; the functions must live for the
    /// whole program.
    pub unsafe fn from_static(entry: EntryPoints, origin: impl Into<String>) -> Self {
        Self {
            entry,
            origin: origin.into(),
            library: None,
        }
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entry
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn unload(self) -> Result<(), Error> {
        let origin = self.origin;
        match self.library {
            Some(library) => library.close().map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message(format!("failed to unload {origin}"))
                    .with_source(err)
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("origin", &self.origin)
            .field("dynamic", &self.library.is_some())
            .finish()
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &str, origin: &str) -> Result<T, Error> {
    let mut raw = Vec::with_capacity(name.len() + 1);
    raw.extend_from_slice(name.as_bytes());
    raw.push(0);
    // SAFETY: caller guarantees `T` matches the symbol's real type.
    let symbol = unsafe { library.get::<T>(&raw) }.map_err(|err| {
        Error::new(ErrorKind::Bind)
            .with_message(format!("{name} symbol not found in {origin}"))
            .with_source(err)
    })?;
    debug!(symbol = name, "found");
    Ok(*symbol)
}

#[cfg(test)]
mod tests {
    use super::NativeLibrary;
    use crate::core::error::ErrorKind;
    use crate::core::platform::LibraryLocation;

    #[test]
    fn missing_file_is_a_bind_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("libunice68.so");
        let err = NativeLibrary::open(&LibraryLocation::Prebuilt(path.clone()))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Bind);
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn garbage_file_is_a_bind_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("libunice68.so");
        std::fs::write(&path, b"not a shared object").expect("write");
        let err = NativeLibrary::open_path(&path).expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::Bind);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn library_without_unice68_symbols_aborts_binding() {
        // libc is always loadable and never exports unice68 entry points.
        let err = NativeLibrary::open_system("libc.so.6").expect_err("no symbols");
        assert_eq!(err.kind(), ErrorKind::Bind);
        assert!(
            err.message()
                .unwrap_or_default()
                .contains("unice68_depacked_size symbol not found")
        );
    }
}
