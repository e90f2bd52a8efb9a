//! Split and merge: the structural mutations that carve a free block down
//! to size, and fuse free neighbors back together on release.

use std::ptr::NonNull;

use crate::header::{BlockHeader, MIN_SPLIT_SUFFIX};
use crate::list::GlobalList;
use crate::region;

/// Splits `block` (which must currently be free) so its prefix occupies
/// exactly `target` bytes and the remainder becomes a new free suffix
/// block, unless the suffix would be smaller than [`MIN_SPLIT_SUFFIX`], in
/// which case the split is refused and `block` is left untouched.
///
/// Returns `true` if the split happened.
///
/// The caller is responsible for setting `block`'s `free` flag once this
/// returns; split itself never changes it.
pub(crate) unsafe fn split(
    list: &mut GlobalList,
    split_counter: &mut u64,
    block: NonNull<BlockHeader>,
    target: usize,
) -> bool {
    debug_assert!(unsafe { BlockHeader::is_free(block) });

    let block_size = unsafe { BlockHeader::size(block) };
    let suffix_size = block_size - target;

    if suffix_size < MIN_SPLIT_SUFFIX {
        tracing::debug!(block_size, target, suffix_size, "split refused, using block whole");
        return false;
    }

    unsafe {
        let suffix_addr = NonNull::new_unchecked((block.as_ptr() as *mut u8).add(target));
        let region_id = BlockHeader::region_id(block);

        *split_counter += 1;
        let name = format!("Split block {split_counter}");
        let suffix = BlockHeader::init(suffix_addr, suffix_size, true, region_id, &name);

        list.insert_after(block, suffix);
        BlockHeader::set_size(block, target);
    }

    tracing::debug!(target, suffix_size, "split block");
    true
}

/// Coalesces a just-freed `block` with its immediate free neighbors that
/// share its `region_id`, then releases the containing region to the OS
/// if the merge leaves it fully free. Never coalesces across a region
/// boundary.
pub(crate) unsafe fn merge(list: &mut GlobalList, block: NonNull<BlockHeader>) {
    let mut block = block;
    unsafe {
        // 1. absorb a free next neighbor in the same region.
        if let Some(next) = BlockHeader::next(block) {
            if BlockHeader::is_free(next) && BlockHeader::region_id(next) == BlockHeader::region_id(block) {
                absorb_next(list, block, next);
            }
        }

        // 2. fold into a free previous neighbor in the same region; the
        // surviving block becomes `prev`.
        if let Some(prev) = BlockHeader::prev(block) {
            if BlockHeader::is_free(prev) && BlockHeader::region_id(prev) == BlockHeader::region_id(block) {
                absorb_next(list, prev, block);
                block = prev;
            }
        }

        // 3. does `block` now occupy its whole region?
        if occupies_whole_region(block) {
            list.unlink(block);
            let addr = block.as_ptr() as *mut u8;
            let size = BlockHeader::size(block);
            tracing::debug!(region_id = BlockHeader::region_id(block), size, "region fully free, releasing");
            region::release(addr, size);
        }
    }
}

/// Folds `next` into `into`, growing `into`'s size by `next`'s size (each
/// block's size already covers its own header, so adjacent blocks sum
/// directly) and unlinking `next` from the list.
unsafe fn absorb_next(list: &mut GlobalList, into: NonNull<BlockHeader>, next: NonNull<BlockHeader>) {
    unsafe {
        let merged = BlockHeader::size(into) + BlockHeader::size(next);
        list.unlink(next);
        BlockHeader::set_size(into, merged);
    }
}

unsafe fn occupies_whole_region(block: NonNull<BlockHeader>) -> bool {
    unsafe {
        let prev = BlockHeader::prev(block);
        let next = BlockHeader::next(block);
        let region_id = BlockHeader::region_id(block);

        let prev_foreign = prev.is_none_or(|p| BlockHeader::region_id(p) != region_id);
        let next_foreign = next.is_none_or(|n| BlockHeader::region_id(n) != region_id);

        prev_foreign && next_foreign
    }
}
