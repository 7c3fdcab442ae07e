//! ABI version of the exported hook surface.
//!
//! Bump [`ABI_VERSION`] whenever a type in `abi.rs` or an exported symbol
//! signature changes.

pub const ABI_VERSION: u32 = 1;

pub const ABI_NAME: &str = "cxa-bridge";
