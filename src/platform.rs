//! OS memory mapping backend.
//!
//! A small [`PlatformMemory`] trait keeps the unix
//! (`libc::mmap`/`munmap`/`sysconf`) and windows
//! (`VirtualAlloc`/`VirtualFree`/`GetSystemInfo`) backends swappable behind
//! `cfg(unix)` / `cfg(windows)`, with `tracing` events on every OS call.

use std::ptr::NonNull;
use std::sync::OnceLock;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Returns the OS page size, querying it once and caching the result for
/// the lifetime of the process.
#[inline]
pub(crate) fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| unsafe { Kernel::page_size() })
}

trait PlatformMemory {
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;
    unsafe fn return_memory(addr: *mut u8, len: usize) -> bool;
    unsafe fn page_size() -> usize;
}

/// Zero-sized handle selecting the platform backend.
struct Kernel;

/// Requests a new anonymous, private, read-write mapping of `len` bytes
/// from the OS. Returns `None` on mapping exhaustion.
#[inline]
pub(crate) unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
    let result = unsafe { Kernel::request_memory(len) };
    match result {
        Some(addr) => tracing::debug!(len, addr = ?addr.as_ptr(), "mapped new region"),
        None => tracing::error!(len, "OS mapping request failed"),
    }
    result
}

/// Releases a previously mapped range back to the OS. Best-effort: a
/// failure is logged and the caller continues.
#[inline]
pub(crate) unsafe fn return_memory(addr: *mut u8, len: usize) {
    let ok = unsafe { Kernel::return_memory(addr, len) };
    if ok {
        tracing::debug!(addr = ?addr, len, "unmapped region");
    } else {
        tracing::error!(addr = ?addr, len, "munmap failed; region leaked in address space");
    }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use libc::{mmap, munmap, off_t, size_t};
    use std::os::raw::{c_int, c_void};
    use std::ptr::NonNull;

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                let addr = mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET);
                match addr {
                    libc::MAP_FAILED => None,
                    addr => Some(NonNull::new_unchecked(addr).cast::<u8>()),
                }
            }
        }

        unsafe fn return_memory(addr: *mut u8, len: usize) -> bool {
            unsafe { munmap(addr as *mut c_void, len as size_t) == 0 }
        }

        unsafe fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::{Kernel, PlatformMemory};

    use std::mem::MaybeUninit;
    use std::os::raw::c_void;
    use std::ptr::NonNull;

    use windows::Win32::System::{Memory, SystemInformation};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            let protection = Memory::PAGE_READWRITE;
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);
                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: *mut u8, _len: usize) -> bool {
            unsafe { Memory::VirtualFree(addr as *mut c_void, 0, Memory::MEM_RELEASE).is_ok() }
        }

        unsafe fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());
                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}
