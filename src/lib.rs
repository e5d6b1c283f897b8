//! Purpose: Safe Rust access to the unice68 ICE! packer/depacker shipped as a native library.
//! Exports: `api` (load/pack/depack surface), `core` (resolution, binding, codec, errors).
//! Role: Library crate backing the `icepack` CLI and integration tests.
//! Invariants: All native calls go through `core::unice68`; no other module touches raw pointers.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
