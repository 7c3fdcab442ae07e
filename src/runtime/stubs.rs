//! Exported hooks callable from compiled static-initialization code and the
//! loader's generated wrappers.
//!
//! These extern "C" functions are pure forwarders into the process-wide
//! [`Registry`](super::registry::Registry). They never log, retry or inspect
//! statuses. Calling a forwarder before `cxa_bridge_install` traps.
//!
//! The canonical names (`__cxa_atexit`, `atexit`, `__wasm_call_dtors`) are
//! only emitted unmangled on wasm targets or with the `export-abi` feature.
//! On a native host they would otherwise shadow the C library's own
//! `atexit` in every binary that links this crate.

use super::abi::{AtExitFn, Cleanup, Dtor, Registrar, Runner};
use super::registry::{self, registry};
use std::ffi::{c_int, c_void};
use std::ptr;

// =========================================================================
// Initialization
// =========================================================================

/// Install the managed runtime's registrar and runner.
///
/// Must run once, before any static initializer. A second call replaces the
/// previous pair.
#[unsafe(no_mangle)]
pub extern "C" fn cxa_bridge_install(registrar: Registrar, runner: Runner) {
    registry::install(registrar, runner);
}

// =========================================================================
// Registration
// =========================================================================

/// Itanium-style cleanup registration.
///
/// Forwards `(func, arg, dso)` to the installed registrar unchanged and
/// returns its status unmodified.
///
/// # Safety
/// `func` must be safe to call with `arg` when the runner executes.
#[cfg_attr(any(target_family = "wasm", feature = "export-abi"), unsafe(no_mangle))]
pub unsafe extern "C" fn __cxa_atexit(func: Dtor, arg: *mut c_void, dso: *mut c_void) -> c_int {
    unsafe { registry().forward_register(func, arg, dso) }
}

/// Legacy zero-argument cleanup registration.
///
/// Equivalent to `__cxa_atexit(call_bare, func, null)`.
///
/// # Safety
/// `func` must be safe to call when the runner executes.
#[cfg_attr(any(target_family = "wasm", feature = "export-abi"), unsafe(no_mangle))]
pub unsafe extern "C" fn atexit(func: AtExitFn) -> c_int {
    let (dtor, context) = Cleanup::bare(func).into_raw();
    unsafe { __cxa_atexit(dtor, context, ptr::null_mut()) }
}

// =========================================================================
// Teardown
// =========================================================================

/// Called by the loader's exit wrapper once the module is done.
///
/// Not part of the crate's Rust API; the symbol exists only for the linker.
#[cfg_attr(any(target_family = "wasm", feature = "export-abi"), unsafe(no_mangle))]
#[cfg_attr(not(any(target_family = "wasm", feature = "export-abi")), allow(dead_code))]
pub(crate) unsafe extern "C" fn __wasm_call_dtors() {
    unsafe { registry().forward_run() }
}

// The loader binds these by name on wasm; keep their shapes pinned there,
// where the host test suite cannot check the exported symbols.
#[cfg(target_family = "wasm")]
const _: () = {
    let _: extern "C" fn(Registrar, Runner) = cxa_bridge_install;
    let _: unsafe extern "C" fn(Dtor, *mut c_void, *mut c_void) -> c_int = __cxa_atexit;
    let _: unsafe extern "C" fn(AtExitFn) -> c_int = atexit;
    let _: unsafe extern "C" fn() = __wasm_call_dtors;
};
