// In-process stand-in for libunice68: stores data uncompressed behind a real ICE! header.
// Like the real packer it ignores `max`; misbehaving variants exercise the wrapper's checks.
use std::ptr;
use std::slice;

use libc::{c_int, c_void};

use super::Icepack;
use super::header::ICE_HEADER_LEN;
use super::sys::{DepackedSizeFn, DepackerFn, EntryPoints, NativeLibrary, PackerFn};
use crate::core::config::CodecOptions;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Behavior {
    Honest,
    PackerFails,
    PackerOverreports,
    PackerScribbles,
    DepackerFails,
    DepackerScribbles,
    DepackerUnderruns,
    SizeLies,
}

pub(crate) fn icepack(behavior: Behavior) -> Icepack {
    icepack_with(behavior, CodecOptions::default())
}

pub(crate) fn icepack_with(behavior: Behavior, options: CodecOptions) -> Icepack {
    let honest = (
        honest_size as DepackedSizeFn,
        honest_depacker as DepackerFn,
        honest_packer as PackerFn,
    );
    let (size, depacker, packer) = match behavior {
        Behavior::Honest => honest,
        Behavior::PackerFails => (honest.0, honest.1, failing_packer as PackerFn),
        Behavior::PackerOverreports => (honest.0, honest.1, overreporting_packer as PackerFn),
        Behavior::PackerScribbles => (honest.0, honest.1, scribbling_packer as PackerFn),
        Behavior::DepackerFails => (honest.0, failing_depacker as DepackerFn, honest.2),
        Behavior::DepackerScribbles => (honest.0, scribbling_depacker as DepackerFn, honest.2),
        Behavior::DepackerUnderruns => (honest.0, underrunning_depacker as DepackerFn, honest.2),
        Behavior::SizeLies => (lying_size as DepackedSizeFn, honest.1, honest.2),
    };
    // SAFETY: every fake follows the unice68 contract (or breaks it only within
    // the guard region the wrapper allocates) and is a static function.
    let native = unsafe {
        NativeLibrary::from_static(EntryPoints::new(size, depacker, packer), "fake-unice68")
    };
    Icepack::with_options(native, options)
}

fn be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

unsafe fn read_header(src: *const c_void) -> Option<(usize, usize)> {
    let header = unsafe { slice::from_raw_parts(src.cast::<u8>(), ICE_HEADER_LEN) };
    if &header[0..4] != b"ICE!" {
        return None;
    }
    Some((be(&header[4..8]) as usize, be(&header[8..12]) as usize))
}

unsafe extern "C" fn honest_size(buffer: *const c_void, p_csize: *mut c_int) -> c_int {
    let Some((csize, dsize)) = (unsafe { read_header(buffer) }) else {
        return -1;
    };
    if !p_csize.is_null() {
        unsafe { *p_csize = csize as c_int };
    }
    dsize as c_int
}

unsafe extern "C" fn lying_size(buffer: *const c_void, p_csize: *mut c_int) -> c_int {
    unsafe { honest_size(buffer, p_csize) + 1 }
}

unsafe extern "C" fn honest_depacker(dst: *mut c_void, src: *const c_void) -> c_int {
    let Some((csize, dsize)) = (unsafe { read_header(src) }) else {
        return -1;
    };
    if csize != ICE_HEADER_LEN + dsize {
        return -1;
    }
    unsafe {
        ptr::copy_nonoverlapping(
            src.cast::<u8>().add(ICE_HEADER_LEN),
            dst.cast::<u8>(),
            dsize,
        );
    }
    0
}

unsafe extern "C" fn failing_depacker(_dst: *mut c_void, _src: *const c_void) -> c_int {
    -3
}

unsafe extern "C" fn scribbling_depacker(dst: *mut c_void, src: *const c_void) -> c_int {
    let ret = unsafe { honest_depacker(dst, src) };
    if ret == 0 {
        if let Some((_, dsize)) = unsafe { read_header(src) } {
            unsafe { *dst.cast::<u8>().add(dsize) = 0 };
        }
    }
    ret
}

// Writes one byte below `dst`, as a back-to-front decoder does on corrupt input.
unsafe extern "C" fn underrunning_depacker(dst: *mut c_void, src: *const c_void) -> c_int {
    let ret = unsafe { honest_depacker(dst, src) };
    if ret == 0 {
        unsafe { *dst.cast::<u8>().sub(1) = 0 };
    }
    ret
}

unsafe extern "C" fn honest_packer(
    dst: *mut c_void,
    _max: c_int,
    src: *const c_void,
    len: c_int,
) -> c_int {
    let len = len as usize;
    let total = ICE_HEADER_LEN + len;
    let out = dst.cast::<u8>();
    unsafe {
        ptr::copy_nonoverlapping(b"ICE!".as_ptr(), out, 4);
        ptr::copy_nonoverlapping((total as u32).to_be_bytes().as_ptr(), out.add(4), 4);
        ptr::copy_nonoverlapping((len as u32).to_be_bytes().as_ptr(), out.add(8), 4);
        ptr::copy_nonoverlapping(src.cast::<u8>(), out.add(ICE_HEADER_LEN), len);
    }
    total as c_int
}

unsafe extern "C" fn failing_packer(
    _dst: *mut c_void,
    _max: c_int,
    _src: *const c_void,
    _len: c_int,
) -> c_int {
    -1
}

unsafe extern "C" fn overreporting_packer(
    dst: *mut c_void,
    max: c_int,
    src: *const c_void,
    len: c_int,
) -> c_int {
    unsafe { honest_packer(dst, max, src, len) };
    max + 7
}

unsafe extern "C" fn scribbling_packer(
    dst: *mut c_void,
    max: c_int,
    src: *const c_void,
    len: c_int,
) -> c_int {
    let ret = unsafe { honest_packer(dst, max, src, len) };
    unsafe { *dst.cast::<u8>().add(max as usize) = 0 };
    ret
}
