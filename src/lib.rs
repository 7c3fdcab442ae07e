//! Startup/teardown hooks for compiled modules
//!
//! Compiled static initializers register their destructors through
//! `__cxa_atexit`/`atexit`, and the loader's exit wrapper calls
//! `__wasm_call_dtors`. None of these can carry a context argument, so this
//! crate routes them through a registrar/runner pair the managed runtime
//! installs once at load via `cxa_bridge_install`.
//!
//! Build as a static library to link the hooks into a module:
//! `cargo rustc --lib --crate-type=staticlib`.

pub mod runtime;

pub use runtime::*;
