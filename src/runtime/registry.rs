//! Indirection registry for the cleanup hooks
//!
//! The exported hooks have fixed signatures with no room for a "which
//! registry" argument, so the registrar and runner live in process-wide
//! slots. Lifecycle:
//! - load: both slots unset
//! - init: the managed runtime calls [`install`] once, before any static
//!   initializer runs
//! - run: the forwarders read the slots many times
//! - unload: the runner is invoked once; the slots are discarded with the
//!   process
//!
//! The slots are atomics with release stores and acquire loads. Nothing
//! here locks; ordering between install and use is the loader's job.

use super::abi::{Cleanup, Dtor, Registrar, Runner};
use super::error::{Error, Result, Slot};
use std::ffi::{c_int, c_void};
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Registrar and runner slots.
pub struct Registry {
    registrar: AtomicPtr<c_void>,
    runner: AtomicPtr<c_void>,
}

impl Registry {
    /// Create a registry with both slots unset.
    pub const fn new() -> Self {
        Self {
            registrar: AtomicPtr::new(ptr::null_mut()),
            runner: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Store the runtime's registrar and runner.
    ///
    /// Calling this twice silently replaces the first pair. Anything already
    /// registered through the old registrar is then only reachable through
    /// the old runner, which the teardown hook no longer calls. Use
    /// [`Registry::try_install`] where a second install must be rejected.
    pub fn install(&self, registrar: Registrar, runner: Runner) {
        if self.is_installed() {
            log::debug!("replacing previously installed cleanup hooks");
        }
        self.registrar
            .store(registrar as *mut c_void, Ordering::Release);
        self.runner.store(runner as *mut c_void, Ordering::Release);
        log::debug!(
            "cleanup hooks installed: registrar={:p} runner={:p}",
            registrar as *const c_void,
            runner as *const c_void
        );
    }

    /// Store the hooks only if no registrar is installed yet.
    pub fn try_install(&self, registrar: Registrar, runner: Runner) -> Result<()> {
        self.registrar
            .compare_exchange(
                ptr::null_mut(),
                registrar as *mut c_void,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| Error::AlreadyInstalled)?;
        self.runner.store(runner as *mut c_void, Ordering::Release);
        log::debug!(
            "cleanup hooks installed once: registrar={:p} runner={:p}",
            registrar as *const c_void,
            runner as *const c_void
        );
        Ok(())
    }

    /// The installed registrar, if any.
    #[inline]
    pub fn registrar(&self) -> Option<Registrar> {
        let raw = self.registrar.load(Ordering::Acquire);
        if raw.is_null() {
            return None;
        }
        // Only ever written from a `Registrar` in `install`/`try_install`.
        Some(unsafe { mem::transmute::<*mut c_void, Registrar>(raw) })
    }

    /// The installed runner, if any.
    #[inline]
    pub fn runner(&self) -> Option<Runner> {
        let raw = self.runner.load(Ordering::Acquire);
        if raw.is_null() {
            return None;
        }
        Some(unsafe { mem::transmute::<*mut c_void, Runner>(raw) })
    }

    /// Whether both slots are set.
    pub fn is_installed(&self) -> bool {
        !self.registrar.load(Ordering::Acquire).is_null()
            && !self.runner.load(Ordering::Acquire).is_null()
    }

    /// Forward a registration to the registrar and return its status as-is.
    ///
    /// Traps if no registrar is installed.
    ///
    /// # Safety
    /// The installed registrar must accept these arguments; `dtor` must be
    /// safe to call later with `context`.
    #[inline]
    pub unsafe fn forward_register(
        &self,
        dtor: Dtor,
        context: *mut c_void,
        scope: *mut c_void,
    ) -> c_int {
        let Some(registrar) = self.registrar() else {
            unset_slot(Slot::Registrar)
        };
        unsafe { registrar(dtor, context, scope) }
    }

    /// Forward to the runner.
    ///
    /// Traps if no runner is installed.
    ///
    /// # Safety
    /// Must only be called once, after all registrations have happened.
    #[inline]
    pub unsafe fn forward_run(&self) {
        let Some(runner) = self.runner() else {
            unset_slot(Slot::Runner)
        };
        unsafe { runner() }
    }

    /// Register a cleanup from Rust with a null scope handle.
    ///
    /// Unlike the C hooks this reports a missing registrar and a non-zero
    /// registrar status as errors.
    ///
    /// # Safety
    /// Same contract as [`Registry::forward_register`].
    pub unsafe fn register(&self, cleanup: Cleanup) -> Result<()> {
        let registrar = self.registrar().ok_or(Error::NotInstalled {
            slot: Slot::Registrar,
        })?;
        let (dtor, context) = cleanup.into_raw();
        match unsafe { registrar(dtor, context, ptr::null_mut()) } {
            0 => Ok(()),
            status => Err(Error::Registrar { status }),
        }
    }

    /// Return both slots to the unset state.
    #[cfg(test)]
    pub(crate) fn reset(&self) {
        self.registrar.store(ptr::null_mut(), Ordering::Release);
        self.runner.store(ptr::null_mut(), Ordering::Release);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cold]
#[track_caller]
fn unset_slot(slot: Slot) -> ! {
    panic!("cleanup {slot} used before hooks were installed")
}

static REGISTRY: Registry = Registry::new();

/// The process-wide registry read by the exported hooks.
#[inline]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Install hooks into the process-wide registry, replacing any prior pair.
pub fn install(registrar: Registrar, runner: Runner) {
    registry().install(registrar, runner)
}

/// Install hooks into the process-wide registry unless already installed.
pub fn try_install(registrar: Registrar, runner: Runner) -> Result<()> {
    registry().try_install(registrar, runner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static RUNS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn accept(_dtor: Dtor, _ctx: *mut c_void, _scope: *mut c_void) -> c_int {
        0
    }

    unsafe extern "C" fn reject(_dtor: Dtor, _ctx: *mut c_void, _scope: *mut c_void) -> c_int {
        -1
    }

    unsafe extern "C" fn count_run() {
        RUNS.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn other_run() {}

    unsafe extern "C" fn noop(_ctx: *mut c_void) {}

    #[test]
    fn test_new_registry_is_unset() {
        let reg = Registry::new();
        assert!(reg.registrar().is_none());
        assert!(reg.runner().is_none());
        assert!(!reg.is_installed());
    }

    #[test]
    fn test_install_sets_both_slots() {
        let reg = Registry::new();
        reg.install(accept, count_run);
        assert!(reg.is_installed());
        assert_eq!(reg.registrar().map(|f| f as usize), Some(accept as Registrar as usize));
        assert_eq!(reg.runner().map(|f| f as usize), Some(count_run as Runner as usize));
    }

    #[test]
    fn test_install_twice_overwrites() {
        let reg = Registry::new();
        reg.install(accept, count_run);
        reg.install(reject, other_run);
        assert_eq!(reg.registrar().map(|f| f as usize), Some(reject as Registrar as usize));
        assert_eq!(reg.runner().map(|f| f as usize), Some(other_run as Runner as usize));
    }

    #[test]
    fn test_try_install_is_first_writer_wins() {
        let reg = Registry::new();
        assert_eq!(reg.try_install(accept, count_run), Ok(()));
        assert_eq!(reg.try_install(reject, other_run), Err(Error::AlreadyInstalled));
        assert_eq!(reg.registrar().map(|f| f as usize), Some(accept as Registrar as usize));
        assert_eq!(reg.runner().map(|f| f as usize), Some(count_run as Runner as usize));
    }

    #[test]
    fn test_forward_run_calls_runner_once() {
        let reg = Registry::new();
        reg.install(accept, count_run);
        let before = RUNS.load(Ordering::SeqCst);
        unsafe { reg.forward_run() };
        assert_eq!(RUNS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_register_maps_status() {
        let reg = Registry::new();
        assert_eq!(
            unsafe { reg.register(Cleanup::with_context(noop, ptr::null_mut())) },
            Err(Error::NotInstalled {
                slot: Slot::Registrar
            })
        );

        reg.install(accept, count_run);
        assert_eq!(
            unsafe { reg.register(Cleanup::with_context(noop, ptr::null_mut())) },
            Ok(())
        );

        reg.install(reject, count_run);
        assert_eq!(
            unsafe { reg.register(Cleanup::with_context(noop, ptr::null_mut())) },
            Err(Error::Registrar { status: -1 })
        );
    }

    #[test]
    fn test_forward_register_passes_status_through() {
        let reg = Registry::new();
        reg.install(reject, count_run);
        let status = unsafe { reg.forward_register(noop, ptr::null_mut(), ptr::null_mut()) };
        assert_eq!(status, -1);
    }

    #[test]
    #[should_panic(expected = "cleanup registrar used before hooks were installed")]
    fn test_forward_register_unset_faults() {
        let reg = Registry::new();
        unsafe { reg.forward_register(noop, ptr::null_mut(), ptr::null_mut()) };
    }

    #[test]
    #[should_panic(expected = "cleanup runner used before hooks were installed")]
    fn test_forward_run_unset_faults() {
        let reg = Registry::new();
        unsafe { reg.forward_run() };
    }

    #[test]
    fn test_reset_clears_slots() {
        let reg = Registry::new();
        reg.install(accept, count_run);
        reg.reset();
        assert!(!reg.is_installed());
    }
}
