//! Built-in cleanup list
//!
//! A registrar/runner pair for hosts that do not bring their own runtime.
//! Registrations go into a fixed-capacity list; the runner pops them in
//! reverse registration order, so later-constructed objects are torn down
//! first. Each entry is removed before it runs and therefore runs once.

use super::abi::{Cleanup, Dtor};
use super::error::{Error, Result};
use super::registry;
use arrayvec::ArrayVec;
use std::ffi::{c_int, c_void};
use std::sync::{Mutex, MutexGuard};

/// Maximum registrations held by the process-wide list.
pub const BUILTIN_CAPACITY: usize = 32;

/// Ordered list of pending cleanups, stored inline.
///
/// Registration happens while static initializers run, so the list never
/// allocates.
#[derive(Debug)]
pub struct CleanupList<const N: usize = BUILTIN_CAPACITY> {
    entries: ArrayVec<Cleanup, N>,
}

// Contexts are opaque tokens owned by whoever registered them, and the list
// is only touched during single-threaded load/unload phases.
unsafe impl<const N: usize> Send for CleanupList<N> {}

impl<const N: usize> CleanupList<N> {
    pub const fn new() -> Self {
        Self {
            entries: ArrayVec::new_const(),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a cleanup, failing once the list is full.
    pub fn push(&mut self, cleanup: Cleanup) -> Result<()> {
        self.entries
            .try_push(cleanup)
            .map_err(|_| Error::BuiltinFull { capacity: N })
    }

    /// Remove the most recently registered cleanup.
    pub fn pop(&mut self) -> Option<Cleanup> {
        self.entries.pop()
    }

    /// Run and remove every cleanup, newest first. Returns how many ran.
    ///
    /// # Safety
    /// Every registered callback must still be valid to call.
    pub unsafe fn run_all(&mut self) -> usize {
        let mut ran = 0;
        while let Some(cleanup) = self.pop() {
            unsafe { cleanup.invoke() };
            ran += 1;
        }
        ran
    }
}

impl<const N: usize> Default for CleanupList<N> {
    fn default() -> Self {
        Self::new()
    }
}

static BUILTIN: Mutex<CleanupList> = Mutex::new(CleanupList::new());

fn builtin_list() -> MutexGuard<'static, CleanupList> {
    // A cleanup that panicked must not wedge the rest of teardown.
    BUILTIN.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registrar backed by the process-wide list.
///
/// Returns 0 on success and -1 when the list is full. The scope handle is
/// ignored: every registration belongs to the one module.
///
/// # Safety
/// `dtor` must be safe to call with `context` when the runner executes.
pub unsafe extern "C" fn builtin_registrar(
    dtor: Dtor,
    context: *mut c_void,
    _scope: *mut c_void,
) -> c_int {
    match builtin_list().push(Cleanup::with_context(dtor, context)) {
        Ok(()) => 0,
        Err(err) => {
            log::warn!("{err}");
            -1
        }
    }
}

/// Runner draining the process-wide list.
///
/// The lock is released around each callback so a cleanup may register
/// further cleanups; those run in the same pass.
///
/// Cleanups run newest first, the C++ destruction order. This differs from
/// runtimes that replay registrations oldest first, so hosts switching
/// between the two should not rely on cross-object teardown order.
///
/// # Safety
/// Every registered callback must still be valid to call.
pub unsafe extern "C" fn builtin_runner() {
    let mut ran = 0usize;
    loop {
        let Some(cleanup) = builtin_list().pop() else {
            break;
        };
        log::trace!("running cleanup {cleanup:?}");
        unsafe { cleanup.invoke() };
        ran += 1;
    }
    log::debug!("builtin runner finished: {ran} cleanup(s)");
}

/// Install the built-in pair into the process-wide registry unless another
/// runtime got there first.
pub fn install_builtin() -> Result<()> {
    registry::try_install(builtin_registrar, builtin_runner)
}

/// Number of cleanups waiting in the process-wide list.
pub fn pending() -> usize {
    builtin_list().len()
}
