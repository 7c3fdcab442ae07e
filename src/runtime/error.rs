//! Error types for the Rust-side hook API.
//!
//! The exported C symbols have fixed signatures and no error channel, so they
//! pass statuses through or trap. Everything callable from Rust reports
//! failures through [`Error`] instead.

use std::ffi::c_int;

/// Which indirection slot an operation needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Registrar,
    Runner,
}

impl Slot {
    pub fn name(self) -> &'static str {
        match self {
            Slot::Registrar => "registrar",
            Slot::Runner => "runner",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("hooks already installed")]
    AlreadyInstalled,

    #[error("{slot} slot is not installed")]
    NotInstalled { slot: Slot },

    #[error("frame buffer of {requested} bytes exceeds limit of {max} bytes")]
    FrameBufferTooLarge { requested: usize, max: usize },

    #[error("registrar rejected cleanup (status={status})")]
    Registrar { status: c_int },

    #[error("builtin cleanup list is full (capacity={capacity})")]
    BuiltinFull { capacity: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
