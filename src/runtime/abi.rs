//! Function-pointer types shared with the loader and the managed runtime
//!
//! Every type here crosses the C ABI boundary. Layout and calling convention
//! are fixed by the collaborators, so nothing in this file may change shape
//! without bumping [`super::ABI_VERSION`].
//!
//! Two registration forms exist:
//! - `(callback, context)`: the general form accepted by the registrar
//! - bare `callback()`: the legacy `atexit` form, carried through the general
//!   form by passing the callback itself as context to [`call_bare`]

use std::ffi::{c_int, c_void};
use std::mem;

/// Cleanup callback receiving its registration context.
pub type Dtor = unsafe extern "C" fn(*mut c_void);

/// Legacy zero-argument cleanup callback.
pub type AtExitFn = unsafe extern "C" fn();

/// Runtime-provided registrar: `(callback, context, scope) -> status`.
///
/// The scope handle identifies the owning module and is usually null.
pub type Registrar = unsafe extern "C" fn(Dtor, *mut c_void, *mut c_void) -> c_int;

/// Runtime-provided runner executing every registered cleanup.
pub type Runner = unsafe extern "C" fn();

/// Callback handed a frame-bound buffer and the caller's data pointer.
pub type FrameFn = unsafe extern "C" fn(*mut u8, *mut c_void);

// The legacy form smuggles a function pointer through a data pointer.
// Refuse to build where the two widths differ instead of truncating.
const _: () = assert!(mem::size_of::<AtExitFn>() == mem::size_of::<*mut c_void>());
const _: () = assert!(mem::size_of::<Dtor>() == mem::size_of::<usize>());

// =========================================================================
// Cleanup registrations
// =========================================================================

/// A cleanup as seen by Rust code, before it is flattened for the registrar.
#[derive(Clone, Copy)]
pub enum Cleanup {
    /// Callback invoked with an opaque context pointer.
    WithContext { dtor: Dtor, context: *mut c_void },
    /// Legacy callback taking no arguments.
    Bare(AtExitFn),
}

impl Cleanup {
    /// Create a context-carrying cleanup.
    #[inline]
    pub fn with_context(dtor: Dtor, context: *mut c_void) -> Self {
        Cleanup::WithContext { dtor, context }
    }

    /// Create a legacy zero-argument cleanup.
    #[inline]
    pub fn bare(func: AtExitFn) -> Self {
        Cleanup::Bare(func)
    }

    /// Flatten into the `(callback, context)` pair the registrar accepts.
    ///
    /// Bare callbacks become `(call_bare, func as context)`.
    #[inline]
    pub fn into_raw(self) -> (Dtor, *mut c_void) {
        match self {
            Cleanup::WithContext { dtor, context } => (dtor, context),
            Cleanup::Bare(func) => (call_bare as Dtor, func as *mut c_void),
        }
    }

    /// Run the cleanup directly.
    ///
    /// # Safety
    /// The callback must be valid to call with its context, and must not
    /// have run already if it is not idempotent.
    pub unsafe fn invoke(self) {
        match self {
            Cleanup::WithContext { dtor, context } => unsafe { dtor(context) },
            Cleanup::Bare(func) => unsafe { func() },
        }
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cleanup::WithContext { dtor, context } => f
                .debug_struct("WithContext")
                .field("dtor", &(*dtor as *const c_void))
                .field("context", context)
                .finish(),
            Cleanup::Bare(func) => f
                .debug_tuple("Bare")
                .field(&(*func as *const c_void))
                .finish(),
        }
    }
}

/// Trampoline for legacy registrations: `context` is the original callback.
///
/// # Safety
/// `context` must have been produced from an [`AtExitFn`] by
/// [`Cleanup::into_raw`].
pub unsafe extern "C" fn call_bare(context: *mut c_void) {
    let func = unsafe { mem::transmute::<*mut c_void, AtExitFn>(context) };
    unsafe { func() }
}
