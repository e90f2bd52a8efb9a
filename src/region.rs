//! Region lifecycle: acquire new OS-backed regions on demand, release
//! them back to the OS once fully coalesced.
//!
//! A region is not represented by its own object (per the data model): it
//! is identified implicitly by the `region_id` stamped on every block
//! carved from it, and its byte range is exactly the range spanned by
//! those blocks. When [`crate::split_merge::merge`] discovers a block that
//! occupies its whole region, that block's own address and size already
//! describe the mapped range, so releasing it needs nothing more than an
//! `munmap`/`VirtualFree` call.

use std::ptr::NonNull;

use crate::header::{BlockHeader, HEADER_SIZE};
use crate::list::GlobalList;
use crate::platform;

/// Requests a new region sized to comfortably hold `target` bytes (header
/// included), rounded up to a whole number of pages. Appends a single free
/// block spanning the region to `list`. Returns the new block, or `None`
/// on OS mapping exhaustion.
pub(crate) unsafe fn acquire(
    list: &mut GlobalList,
    region_id: u64,
    region_counter: u64,
    target: usize,
) -> Option<NonNull<BlockHeader>> {
    let page = platform::page_size();
    let region_size = crate::header::align_up(target.max(HEADER_SIZE), page);

    let base = unsafe { platform::request_memory(region_size) }?;

    let name = format!("Allocation {region_counter}");
    let block = unsafe { BlockHeader::init(base, region_size, true, region_id, &name) };
    unsafe {
        list.push_back(block);
    }

    tracing::debug!(region_id, region_size, "new region backs allocation");
    Some(block)
}

/// Unmaps the byte range `[addr, addr + size)`. Called once
/// [`crate::split_merge::merge`] has determined a block fully occupies its
/// region and has already unlinked it from the global list.
pub(crate) unsafe fn release(addr: *mut u8, size: usize) {
    unsafe {
        platform::return_memory(addr, size);
    }
}
