//! The public allocator: wraps placement search, split/merge and region
//! lifecycle under a single global mutex, and exposes the C-style entry
//! points plus a [`std::alloc::GlobalAlloc`] adapter.

use std::alloc::{GlobalAlloc, Layout};
use std::ptr::{self, NonNull};
use std::sync::Mutex;

use crate::config::{self, Policy, SCRIBBLE_BYTE};
use crate::header::{self, BlockHeader, HEADER_SIZE};
use crate::list::GlobalList;
use crate::policy;
use crate::region;
use crate::split_merge;

struct Inner {
    list: GlobalList,
    next_region_id: u64,
    alloc_counter: u64,
    split_counter: u64,
    /// Test-only override bypassing the environment, so unit tests don't
    /// race on the shared process environment.
    #[cfg(test)]
    policy_override: Option<Policy>,
}

impl Inner {
    const fn new() -> Self {
        Self {
            list: GlobalList::new(),
            next_region_id: 0,
            alloc_counter: 0,
            split_counter: 0,
            #[cfg(test)]
            policy_override: None,
        }
    }

    fn policy(&self) -> Policy {
        #[cfg(test)]
        if let Some(p) = self.policy_override {
            return p;
        }
        Policy::from_env()
    }
}

// SAFETY: all access to the raw `NonNull<BlockHeader>` pointers inside
// `GlobalList` happens while holding `Allocator::inner`'s mutex, so `Inner`
// can be safely transferred across threads.
unsafe impl Send for Inner {}

/// A general-purpose, mmap-backed memory allocator.
///
/// Carves large OS-supplied anonymous regions into in-band-headered
/// blocks, reusing freed blocks via a configurable placement policy
/// and coalescing on release. See the crate docs for the full design.
pub struct Allocator {
    inner: Mutex<Inner>,
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator {
    /// Creates a fresh, empty allocator. Cheap and `const`, so it can back
    /// a `#[global_allocator]` static.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Allocates `size` bytes, returning a payload pointer or null on OS
    /// mapping exhaustion.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        let mut inner = self.inner.lock().unwrap();
        unsafe { self.allocate_locked(&mut inner, size, None) }
    }

    /// `allocate(count * elem_size)`, zeroing the full payload afterward.
    /// Returns null (rather than wrapping) if `count * elem_size`
    /// overflows `usize`.
    pub fn zeroed_allocate(&self, count: usize, elem_size: usize) -> *mut u8 {
        let Some(total) = count.checked_mul(elem_size) else {
            tracing::error!(count, elem_size, "zeroed_allocate size overflow");
            return ptr::null_mut();
        };

        let mut inner = self.inner.lock().unwrap();
        let payload = unsafe { self.allocate_locked(&mut inner, total, None) };
        if !payload.is_null() {
            unsafe {
                let header = BlockHeader::from_payload(NonNull::new_unchecked(payload));
                let payload_len = BlockHeader::size(header) - HEADER_SIZE;
                ptr::write_bytes(payload, 0, payload_len);
            }
        }
        payload
    }

    /// `allocate(size)`, then overwrites the block's debug label with
    /// `name` (truncated to fit).
    pub fn named_allocate(&self, size: usize, name: &str) -> *mut u8 {
        let mut inner = self.inner.lock().unwrap();
        unsafe { self.allocate_locked(&mut inner, size, Some(name)) }
    }

    /// Frees a payload pointer previously returned by this allocator.
    /// `p == null` is a no-op.
    pub fn free(&self, p: *mut u8) {
        let Some(payload) = NonNull::new(p) else {
            return;
        };
        let mut inner = self.inner.lock().unwrap();
        unsafe {
            let block = BlockHeader::from_payload(payload);
            BlockHeader::set_free(block, true);
            split_merge::merge(&mut inner.list, block);
        }
    }

    /// Resizes the allocation at `p` to `new_size`.
    ///
    /// - `p == null` behaves like `allocate(new_size)`.
    /// - `new_size == 0` frees `p` and returns null.
    /// - Otherwise, a new block is allocated, `min(new_size, old payload
    ///   capacity)` bytes are copied from the old payload, the old block
    ///   is freed, and the new pointer is returned.
    pub fn resize(&self, p: *mut u8, new_size: usize) -> *mut u8 {
        let Some(old_payload) = NonNull::new(p) else {
            return self.allocate(new_size);
        };
        if new_size == 0 {
            self.free(p);
            return ptr::null_mut();
        }

        let new_payload = self.allocate(new_size);
        if new_payload.is_null() {
            return ptr::null_mut();
        }

        unsafe {
            let old_block = BlockHeader::from_payload(old_payload);
            let old_capacity = BlockHeader::size(old_block) - HEADER_SIZE;
            let copy_len = new_size.min(old_capacity);
            ptr::copy_nonoverlapping(old_payload.as_ptr(), new_payload, copy_len);
        }

        self.free(p);
        new_payload
    }

    /// Number of blocks currently tracked, across all regions. Mainly
    /// useful for tests and diagnostics alongside [`Allocator::dump_state`].
    pub fn block_count(&self) -> usize {
        self.inner.lock().unwrap().list.len()
    }

    /// `true` once every outstanding payload has been freed and every
    /// region has been unmapped.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().list.is_empty()
    }

    /// Prints region headers (on region-id transitions) and one line per
    /// block to standard output.
    pub fn dump_state(&self) {
        let inner = self.inner.lock().unwrap();
        let mut current_region: Option<u64> = None;
        let mut block_count = 0usize;

        for block in inner.list.iter() {
            unsafe {
                let region_id = BlockHeader::region_id(block);
                if current_region != Some(region_id) {
                    println!("-- region {region_id} --");
                    current_region = Some(region_id);
                }

                let start = block.as_ptr() as usize;
                let size = BlockHeader::size(block);
                let end = start + size;
                let name = BlockHeader::name(block);
                let state = if BlockHeader::is_free(block) { "FREE" } else { "USED" };
                println!("{start:#x}-{end:#x} '{name}' {size} [{state}]");
            }
            block_count += 1;
        }

        tracing::debug!(block_count, "dump_state complete");
    }

    unsafe fn allocate_locked(&self, inner: &mut Inner, size: usize, name: Option<&str>) -> *mut u8 {
        let target = header::align_up(size + HEADER_SIZE, header::ALIGNMENT);
        let policy = inner.policy();

        let block = match policy::find(&inner.list, target, policy) {
            Some(candidate) => unsafe { self.reuse(inner, candidate, target) },
            None => {
                tracing::debug!(target, "no free block fits, acquiring new region");
                let region_id = inner.next_region_id;
                inner.next_region_id += 1;
                inner.alloc_counter += 1;
                let alloc_counter = inner.alloc_counter;

                let Some(fresh) = (unsafe { region::acquire(&mut inner.list, region_id, alloc_counter, target) })
                else {
                    return ptr::null_mut();
                };
                unsafe { self.reuse(inner, fresh, target) }
            }
        };

        unsafe {
            BlockHeader::set_free(block, false);
            if let Some(name) = name {
                BlockHeader::set_name(block, name);
            }

            let payload = BlockHeader::payload(block);
            if config::scribble_enabled() {
                let len = BlockHeader::size(block) - HEADER_SIZE;
                ptr::write_bytes(payload.as_ptr(), SCRIBBLE_BYTE, len);
            }
            payload.as_ptr()
        }
    }

    /// Splits `candidate` down to `target` bytes if worthwhile (the
    /// candidate is used whole otherwise). Returns the block that will
    /// hold the caller's payload.
    unsafe fn reuse(
        &self,
        inner: &mut Inner,
        candidate: NonNull<BlockHeader>,
        target: usize,
    ) -> NonNull<BlockHeader> {
        unsafe {
            split_merge::split(&mut inner.list, &mut inner.split_counter, candidate, target);
        }
        candidate
    }
}

unsafe impl GlobalAlloc for Allocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.allocate(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.free(ptr);
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.zeroed_allocate(1, layout.size())
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        self.resize(ptr, new_size)
    }
}
