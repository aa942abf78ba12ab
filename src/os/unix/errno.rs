// Lifted from the standard library's internal errno handling. `readdir`
// is the one POSIX call in this crate that can't tell "end of stream" apart
// from "error" except by checking errno, so we need access to it directly.

use libc::c_int;

extern "C" {
    #[cfg_attr(
        any(target_os = "linux", target_os = "emscripten", target_os = "fuchsia"),
        link_name = "__errno_location"
    )]
    #[cfg_attr(
        any(target_os = "netbsd", target_os = "openbsd", target_os = "android"),
        link_name = "__errno"
    )]
    #[cfg_attr(
        any(target_os = "macos", target_os = "ios", target_os = "freebsd"),
        link_name = "__error"
    )]
    fn errno_location() -> *mut c_int;
}

/// Returns the platform-specific value of errno.
pub fn errno() -> i32 {
    unsafe { (*errno_location()) as i32 }
}

/// Clears the platform-specific value of errno to 0.
pub fn clear() {
    unsafe {
        *errno_location() = 0;
    }
}
