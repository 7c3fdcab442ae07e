//! Frame-bound scratch buffers
//!
//! [`with_frame_buffer`] hands a closure `size` bytes that live in a stack
//! frame owned by the call itself. Rust has no variable-length automatic
//! storage, so the request is rounded up to a fixed size class and served
//! from a non-inlined function holding an array of that class. The frame is
//! popped on every exit path, unwinding included, and no pointer to it can
//! outlive the closure's borrow.
//!
//! Requests above [`MAX_FRAME_BUFFER`] are refused rather than risk running
//! off the end of a small stack. The limit depends on the target: wasm
//! modules run on a linear-memory shadow stack that is much smaller than a
//! native thread stack.

use super::abi::FrameFn;
use super::error::{Error, Result};
use std::ffi::c_void;
use std::mem::MaybeUninit;
use std::ptr;

/// Largest buffer [`with_frame_buffer`] will place on the stack.
#[cfg(target_family = "wasm")]
pub const MAX_FRAME_BUFFER: usize = 16 * 1024;

/// Largest buffer [`with_frame_buffer`] will place on the stack.
#[cfg(not(target_family = "wasm"))]
pub const MAX_FRAME_BUFFER: usize = 64 * 1024;

/// Run `f` with a zeroed buffer of exactly `size` bytes on the stack.
///
/// `size == 0` is valid; the slice is empty but its pointer is a real,
/// non-null stack address.
pub fn with_frame_buffer<R>(size: usize, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
    if size > MAX_FRAME_BUFFER {
        return Err(Error::FrameBufferTooLarge {
            requested: size,
            max: MAX_FRAME_BUFFER,
        });
    }

    macro_rules! size_classes {
        ($($class:literal),+ $(,)?) => {
            $(
                if size <= $class {
                    return Ok(on_stack::<$class, R>(size, f));
                }
            )+
        };
    }

    size_classes!(64, 256, 1024, 4096, 16384, 65536);

    // MAX_FRAME_BUFFER never exceeds the largest class.
    Err(Error::FrameBufferTooLarge {
        requested: size,
        max: MAX_FRAME_BUFFER,
    })
}

#[inline(never)]
fn on_stack<const N: usize, R>(size: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
    debug_assert!(size <= N);
    let mut storage = [MaybeUninit::<u8>::uninit(); N];
    let base = storage.as_mut_ptr().cast::<u8>();
    // Only the requested prefix is initialized and exposed.
    let buf = unsafe {
        ptr::write_bytes(base, 0, size);
        std::slice::from_raw_parts_mut(base, size)
    };
    f(buf)
}

/// C entry point: call `callback(buffer, data)` with `size` bytes of
/// frame-bound storage.
///
/// Traps if `size` exceeds [`MAX_FRAME_BUFFER`].
///
/// # Safety
/// `callback` must not retain the buffer pointer past its own return.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cxa_bridge_with_frame_buffer(
    size: usize,
    callback: FrameFn,
    data: *mut c_void,
) {
    let result = with_frame_buffer(size, |buf| unsafe { callback(buf.as_mut_ptr(), data) });
    if let Err(err) = result {
        panic!("cxa_bridge_with_frame_buffer: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_zero_size_buffer_is_valid() {
        let (addr, len) = with_frame_buffer(0, |buf| (buf.as_ptr() as usize, buf.len()))
            .expect("zero-size buffer");
        assert_ne!(addr, 0);
        assert_eq!(len, 0);
    }

    #[test]
    fn test_buffer_has_requested_length() {
        for size in [1, 63, 64, 65, 255, 1000, 4097, MAX_FRAME_BUFFER] {
            let len = with_frame_buffer(size, |buf| buf.len()).expect("buffer");
            assert_eq!(len, size);
        }
    }

    #[test]
    fn test_writes_are_visible_inside_callback() {
        let sum = with_frame_buffer(300, |buf| {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = (i % 251) as u8;
            }
            buf.iter().map(|&b| b as usize).sum::<usize>()
        })
        .expect("buffer");
        let expected: usize = (0..300).map(|i| i % 251).sum();
        assert_eq!(sum, expected);
    }

    #[test]
    fn test_buffer_starts_zeroed() {
        let all_zero = with_frame_buffer(2048, |buf| buf.iter().all(|&b| b == 0)).expect("buffer");
        assert!(all_zero);
    }

    #[test]
    fn test_oversized_request_is_refused() {
        let mut called = false;
        let result = with_frame_buffer(MAX_FRAME_BUFFER + 1, |_| called = true);
        assert_eq!(
            result,
            Err(Error::FrameBufferTooLarge {
                requested: MAX_FRAME_BUFFER + 1,
                max: MAX_FRAME_BUFFER,
            })
        );
        assert!(!called);
    }

    #[test]
    fn test_closure_error_is_returned_unchanged() {
        let result: Result<std::result::Result<(), &str>> =
            with_frame_buffer(32, |buf| {
                buf[0] = 1;
                Err("early exit")
            });
        assert_eq!(result, Ok(Err("early exit")));
    }

    #[test]
    fn test_panicking_callback_releases_frame() {
        let caught = std::panic::catch_unwind(|| {
            with_frame_buffer(128, |buf| {
                if buf.len() == 128 {
                    panic!("callback failed");
                }
                buf.len()
            })
            .ok();
        });
        assert!(caught.is_err());
        assert_eq!(with_frame_buffer(128, |buf| buf.len()), Ok(128));
    }

    static C_CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn fill_and_count(buf: *mut u8, data: *mut c_void) {
        C_CALLS.fetch_add(1, Ordering::SeqCst);
        let out = unsafe { &mut *(data as *mut (usize, bool, u8)) };
        out.0 = buf as usize;
        out.1 = !buf.is_null();
        if out.2 > 0 {
            let bytes = unsafe { std::slice::from_raw_parts_mut(buf, out.2 as usize) };
            bytes.fill(0xAB);
            out.2 = bytes.iter().filter(|&&b| b == 0xAB).count() as u8;
        }
    }

    #[test]
    fn test_c_entry_point_passes_data_and_runs_once() {
        let mut out: (usize, bool, u8) = (0, false, 16);
        let before = C_CALLS.load(Ordering::SeqCst);
        unsafe {
            cxa_bridge_with_frame_buffer(16, fill_and_count, &mut out as *mut _ as *mut c_void)
        };
        assert_eq!(C_CALLS.load(Ordering::SeqCst), before + 1);
        assert!(out.1);
        assert_ne!(out.0, 0);
        assert_eq!(out.2, 16);
    }

    #[test]
    fn test_c_entry_point_zero_size() {
        let mut out: (usize, bool, u8) = (0, false, 0);
        unsafe {
            cxa_bridge_with_frame_buffer(0, fill_and_count, &mut out as *mut _ as *mut c_void)
        };
        assert!(out.1);
    }
}
