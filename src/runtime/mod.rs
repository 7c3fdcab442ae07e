//! Runtime hooks linked into compiled modules
//!
//! This module provides the startup/teardown bridge between a module's
//! generated entry/exit wrappers and the managed runtime. It separates:
//! - Function-pointer types and the legacy adapter (abi.rs)
//! - The process-wide registrar/runner slots (registry.rs)
//! - Extern "C" hooks the loader and static initializers call (stubs.rs)
//! - Frame-bound scratch buffers (frame.rs)
//! - A default cleanup list for hosts without a runtime (builtin.rs)

pub mod abi;
pub mod abi_version;
#[cfg(feature = "builtin")]
pub mod builtin;
pub mod error;
pub mod frame;
pub mod registry;
pub mod stubs;

pub use abi::{AtExitFn, Cleanup, Dtor, FrameFn, Registrar, Runner};
pub use abi_version::ABI_VERSION;
#[cfg(feature = "builtin")]
pub use builtin::{BUILTIN_CAPACITY, CleanupList, install_builtin};
pub use error::{Error, Result, Slot};
pub use frame::{MAX_FRAME_BUFFER, with_frame_buffer};
pub use registry::{Registry, install, registry, try_install};

/// Serializes tests that touch the process-wide registry.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
