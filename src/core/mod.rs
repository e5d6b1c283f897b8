// Core modules: library resolution, native binding and the safe codec.
pub mod builder;
pub mod config;
pub mod error;
pub mod locate;
pub mod platform;
pub mod unice68;
