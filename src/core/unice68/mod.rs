//! Purpose: Memory-safe pack/depack on top of the unchecked unice68 entry points.
//! Exports: `Icepack`, `PackLayout`, `max_packed_size`, `header`, `sys`.
//! Role: The only place that calls into native unice68 code.
//! Invariants: Every native output buffer carries a canary-filled guard region; a touched guard fails the call.
//! Invariants: Depack output is guarded on both sides; the depacker writes back to front.
//! Invariants: Pack allocations always cover the worst case for the input, whatever capacity is declared.
//! Invariants: Native size claims are hints: checked against the parsed header, input length and `CodecOptions`.
//! Invariants: Callers only ever see the first `n` bytes of an allocation; buffers never outlive a call.
//! Invariants: Empty input is handled without native calls (header-only stream).
use libc::{c_int, c_void};

use crate::core::config::CodecOptions;
use crate::core::error::{Error, ErrorKind};

pub mod header;
pub mod sys;

#[cfg(test)]
mod fake;

use header::{ICE_HEADER_LEN, IceHeader};
use sys::NativeLibrary;

const GUARD_BYTE: u8 = 0xA5;
const PACK_BOUND_PAD: usize = 16;

/// Worst-case packed size for `len` input bytes: `16 + len * 9 / 8`.
pub fn max_packed_size(len: usize) -> Option<usize> {
    len.checked_mul(9)
        .map(|bits| bits >> 3)
        .and_then(|bound| bound.checked_add(PACK_BOUND_PAD))
}

/// Output buffer sizing for one `pack` call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PackLayout {
    /// Capacity declared to the native packer.
    pub capacity: usize,
    /// Bytes actually allocated: the larger of capacity and the worst case, plus the guard region.
    pub allocation: usize,
}

#[derive(Debug)]
pub struct Icepack {
    native: NativeLibrary,
    options: CodecOptions,
}

impl Icepack {
    pub fn new(native: NativeLibrary) -> Self {
        Self::with_options(native, CodecOptions::default())
    }

    pub fn with_options(native: NativeLibrary, options: CodecOptions) -> Self {
        Self { native, options }
    }

    pub fn native(&self) -> &NativeLibrary {
        &self.native
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn unload(self) -> Result<(), Error> {
        self.native.unload()
    }

    /// Returns `(depacked_size, packed_size)` as reported by the library and
    /// confirmed against the header.
    pub fn depacked_size(&self, src: &[u8]) -> Result<(usize, usize), Error> {
        let header = IceHeader::parse(src)?;
        if is_empty_stream(&header) {
            return Ok((0, ICE_HEADER_LEN));
        }

        let mut csize: c_int = 0;
        // SAFETY: `src` holds at least the 12 header bytes the routine reads.
        let ret = unsafe {
            (self.native.entry_points().depacked_size)(src.as_ptr().cast::<c_void>(), &mut csize)
        };
        if ret < 0 {
            return Err(Error::new(ErrorKind::Depack)
                .with_message("unice68_depacked_size failed")
                .with_code(ret));
        }
        if csize < 0 || ret as u32 != header.depacked_size || csize as u32 != header.packed_size {
            return Err(Error::new(ErrorKind::CorruptInput).with_message(format!(
                "library reported {ret}/{csize} bytes, header says {}/{}",
                header.depacked_size, header.packed_size
            )));
        }
        Ok((ret as usize, csize as usize))
    }

    pub fn depack(&self, src: &[u8]) -> Result<Vec<u8>, Error> {
        let (depacked, packed) = self.depacked_size(src)?;
        if packed > src.len() {
            return Err(Error::new(ErrorKind::CorruptInput).with_message(format!(
                "missing packed data: header claims {packed} bytes, input has {}",
                src.len()
            )));
        }
        if depacked == 0 {
            if packed == ICE_HEADER_LEN {
                return Ok(Vec::new());
            }
            return Err(Error::new(ErrorKind::CorruptInput).with_message(format!(
                "header declares no depacked data behind {packed} packed bytes"
            )));
        }
        if depacked > self.options.max_depacked_size
            || depacked > packed.saturating_mul(self.options.max_expansion_ratio)
        {
            return Err(Error::new(ErrorKind::InvalidHeader).with_message(format!(
                "implausible depacked size {depacked} for {packed} packed bytes"
            )));
        }

        let guard = self.options.supplement_for(depacked);
        let allocation = depacked
            .checked_add(guard)
            .and_then(|total| total.checked_add(guard))
            .ok_or_else(|| Error::new(ErrorKind::InvalidHeader).with_message("size overflow"))?;
        let mut dst = vec![GUARD_BYTE; allocation];
        // SAFETY: `src` holds the `packed` bytes the depacker reads; the output
        // pointer has `depacked` bytes ahead of it and a guard region on each side.
        let ret = unsafe {
            (self.native.entry_points().depacker)(
                dst[guard..].as_mut_ptr().cast::<c_void>(),
                src.as_ptr().cast::<c_void>(),
            )
        };
        if ret != 0 {
            return Err(Error::new(ErrorKind::Depack)
                .with_message("unice68_depacker failed")
                .with_code(ret));
        }
        let end = guard + depacked;
        if guard_touched(&dst[..guard]) || guard_touched(&dst[end..]) {
            return Err(Error::new(ErrorKind::CorruptInput)
                .with_message("depacker wrote outside the declared depacked size"));
        }

        dst.truncate(end);
        dst.drain(..guard);
        Ok(dst)
    }

    pub fn pack(&self, src: &[u8]) -> Result<Vec<u8>, Error> {
        let capacity = max_packed_size(src.len())
            .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("input too large"))?;
        self.pack_with_capacity(src, capacity)
    }

    /// Pack with an explicit capacity declared to the native packer.
    ///
    /// The packer does not bound its writes by the declared capacity, so the
    /// buffer still covers the worst case for `src`; a result longer than
    /// `max_size` is rejected.
    pub fn pack_with_capacity(&self, src: &[u8], max_size: usize) -> Result<Vec<u8>, Error> {
        if src.is_empty() {
            return Ok(IceHeader::empty().to_vec());
        }
        if max_size == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("invalid maximum size 0"));
        }
        let len = c_int::try_from(src.len())
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("input too large"))?;
        let max = c_int::try_from(max_size)
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("maximum size too large"))?;
        let layout = self.pack_layout(src.len(), max_size)?;

        let mut dst = vec![GUARD_BYTE; layout.allocation];
        // SAFETY: `dst` covers the worst-case packed size for `len` bytes (and
        // at least `max`) plus a guard region; `src` holds `len` bytes.
        let ret = unsafe {
            (self.native.entry_points().packer)(
                dst.as_mut_ptr().cast::<c_void>(),
                max,
                src.as_ptr().cast::<c_void>(),
                len,
            )
        };
        if ret < 0 {
            return Err(Error::new(ErrorKind::Pack)
                .with_message("unice68_packer failed")
                .with_code(ret));
        }
        let written = ret as usize;
        if written > layout.capacity {
            return Err(Error::new(ErrorKind::Pack)
                .with_message(format!(
                    "unice68_packer overflowed by {}",
                    written - layout.capacity
                ))
                .with_code(ret));
        }
        if guard_touched(&dst[layout.capacity..]) {
            return Err(Error::new(ErrorKind::Pack)
                .with_message("unice68_packer wrote past the declared capacity"));
        }

        dst.truncate(written);
        let header = IceHeader::parse(&dst).map_err(|err| {
            Error::new(ErrorKind::Pack)
                .with_message("unice68_packer produced no valid header")
                .with_source(err)
        })?;
        if header.packed_size as usize != written || header.depacked_size as usize != src.len() {
            return Err(Error::new(ErrorKind::Pack).with_message(format!(
                "packed header claims {}/{} bytes, expected {written}/{}",
                header.packed_size,
                header.depacked_size,
                src.len()
            )));
        }
        Ok(dst)
    }

    /// Buffer sizing for packing `input_len` bytes with `capacity` declared.
    pub fn pack_layout(&self, input_len: usize, capacity: usize) -> Result<PackLayout, Error> {
        let too_large = || Error::new(ErrorKind::Usage).with_message("input too large");
        let reach = max_packed_size(input_len).ok_or_else(too_large)?.max(capacity);
        let allocation = reach
            .checked_add(self.options.supplement_for(reach))
            .ok_or_else(too_large)?;
        Ok(PackLayout {
            capacity,
            allocation,
        })
    }
}

fn is_empty_stream(header: &IceHeader) -> bool {
    header.depacked_size == 0 && header.packed_size as usize == ICE_HEADER_LEN
}

fn guard_touched(guard: &[u8]) -> bool {
    guard.iter().any(|&byte| byte != GUARD_BYTE)
}
