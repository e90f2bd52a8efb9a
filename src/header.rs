//! Block header layout.
//!
//! Every allocation carved out of a region is prefixed by a fixed-size,
//! packed [`BlockHeader`]. External tooling assumes the header is exactly
//! [`HEADER_SIZE`] bytes, so the layout must never grow or shrink; the
//! `const_assert_eq!` below pins it at compile time.

use std::ptr::NonNull;

use static_assertions::const_assert_eq;

/// Size of a block header in bytes, header + payload offset.
pub(crate) const HEADER_SIZE: usize = 100;

/// Alignment unit used for block sizes and payload offsets.
pub(crate) const ALIGNMENT: usize = 8;

/// Smallest byte count a suffix must have for a split to be worth doing:
/// a full header plus one aligned word of usable payload.
pub(crate) const MIN_SPLIT_SUFFIX: usize = HEADER_SIZE + 4;

/// Smallest legal block size: header plus minimum payload slack. No live
/// block may ever be smaller than this; enforced in [`BlockHeader::init`].
pub(crate) const MIN_BLOCK_SIZE: usize = HEADER_SIZE + 4;

/// Usable characters in [`BlockHeader::name`], not counting the NUL
/// terminator.
pub(crate) const NAME_CAPACITY: usize = 31;

const NAME_FIELD_LEN: usize = NAME_CAPACITY + 1;

/// Sentinel stored in `next`/`prev` meaning "no link". Real mapped
/// addresses are never zero.
const NULL_LINK: usize = 0;

/// In-band block metadata, packed to exactly [`HEADER_SIZE`] bytes.
///
/// ```text
/// +----------------+
/// |    name[32]     |
/// +----------------+
/// |      size      |
/// +----------------+
/// |   free (1B)    |
/// +----------------+
/// |   region_id    |
/// +----------------+
/// |      next      |
/// +----------------+
/// |      prev      |
/// +----------------+
/// |    padding     |
/// +----------------+   <- payload starts here, at header + 100
/// ```
#[repr(C, packed)]
pub(crate) struct BlockHeader {
    name: [u8; NAME_FIELD_LEN],
    size: u64,
    free: u8,
    region_id: u64,
    next: u64,
    prev: u64,
    _padding: [u8; HEADER_SIZE - NAME_FIELD_LEN - 8 - 1 - 8 - 8 - 8],
}

const_assert_eq!(std::mem::size_of::<BlockHeader>(), HEADER_SIZE);

impl BlockHeader {
    /// Writes a fresh header at `addr`. `addr` must be valid for at least
    /// `size` bytes and suitably owned by the caller (the allocator).
    pub(crate) unsafe fn init(
        addr: NonNull<u8>,
        size: usize,
        free: bool,
        region_id: u64,
        name: &str,
    ) -> NonNull<BlockHeader> {
        debug_assert!(size >= MIN_BLOCK_SIZE, "block size below MIN_BLOCK_SIZE");
        let ptr = addr.cast::<BlockHeader>();
        unsafe {
            ptr.as_ptr().write(BlockHeader {
                name: [0; NAME_FIELD_LEN],
                size: size as u64,
                free: free as u8,
                region_id,
                next: NULL_LINK as u64,
                prev: NULL_LINK as u64,
                _padding: [0; HEADER_SIZE - NAME_FIELD_LEN - 8 - 1 - 8 - 8 - 8],
            });
            Self::set_name(ptr, name);
        }
        ptr
    }

    #[inline]
    pub(crate) unsafe fn payload(ptr: NonNull<BlockHeader>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(ptr.as_ptr().cast::<u8>().add(HEADER_SIZE)) }
    }

    #[inline]
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<BlockHeader> {
        unsafe { NonNull::new_unchecked(payload.as_ptr().sub(HEADER_SIZE)).cast() }
    }

    #[inline]
    pub(crate) unsafe fn size(ptr: NonNull<BlockHeader>) -> usize {
        unsafe { (*ptr.as_ptr()).size as usize }
    }

    #[inline]
    pub(crate) unsafe fn set_size(ptr: NonNull<BlockHeader>, size: usize) {
        unsafe {
            (*ptr.as_ptr()).size = size as u64;
        }
    }

    #[inline]
    pub(crate) unsafe fn is_free(ptr: NonNull<BlockHeader>) -> bool {
        unsafe { (*ptr.as_ptr()).free != 0 }
    }

    #[inline]
    pub(crate) unsafe fn set_free(ptr: NonNull<BlockHeader>, free: bool) {
        unsafe {
            (*ptr.as_ptr()).free = free as u8;
        }
    }

    #[inline]
    pub(crate) unsafe fn region_id(ptr: NonNull<BlockHeader>) -> u64 {
        unsafe { (*ptr.as_ptr()).region_id }
    }

    #[inline]
    pub(crate) unsafe fn set_region_id(ptr: NonNull<BlockHeader>, region_id: u64) {
        unsafe {
            (*ptr.as_ptr()).region_id = region_id;
        }
    }

    #[inline]
    pub(crate) unsafe fn next(ptr: NonNull<BlockHeader>) -> Option<NonNull<BlockHeader>> {
        let raw = unsafe { (*ptr.as_ptr()).next };
        NonNull::new(raw as usize as *mut BlockHeader)
    }

    #[inline]
    pub(crate) unsafe fn set_next(ptr: NonNull<BlockHeader>, next: Option<NonNull<BlockHeader>>) {
        unsafe {
            (*ptr.as_ptr()).next = next.map_or(NULL_LINK as u64, |n| n.as_ptr() as u64);
        }
    }

    #[inline]
    pub(crate) unsafe fn prev(ptr: NonNull<BlockHeader>) -> Option<NonNull<BlockHeader>> {
        let raw = unsafe { (*ptr.as_ptr()).prev };
        NonNull::new(raw as usize as *mut BlockHeader)
    }

    #[inline]
    pub(crate) unsafe fn set_prev(ptr: NonNull<BlockHeader>, prev: Option<NonNull<BlockHeader>>) {
        unsafe {
            (*ptr.as_ptr()).prev = prev.map_or(NULL_LINK as u64, |n| n.as_ptr() as u64);
        }
    }

    /// Copies `name`, truncated to [`NAME_CAPACITY`] bytes, into the header
    /// and NUL-terminates it.
    pub(crate) unsafe fn set_name(ptr: NonNull<BlockHeader>, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_CAPACITY);
        unsafe {
            let field = &raw mut (*ptr.as_ptr()).name;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), field.cast::<u8>(), len);
            std::ptr::write_bytes(field.cast::<u8>().add(len), 0, NAME_CAPACITY - len);
        }
    }

    /// Reads the debug label back out as an owned, lossily-decoded string.
    pub(crate) unsafe fn name(ptr: NonNull<BlockHeader>) -> String {
        unsafe {
            let field = &raw const (*ptr.as_ptr()).name;
            let slice = std::slice::from_raw_parts(field.cast::<u8>(), NAME_CAPACITY);
            let nul = slice.iter().position(|&b| b == 0).unwrap_or(NAME_CAPACITY);
            String::from_utf8_lossy(&slice[..nul]).into_owned()
        }
    }

    /// Address of the block's own header, as a raw integer (for range math
    /// and adjacency checks).
    #[inline]
    pub(crate) fn addr(ptr: NonNull<BlockHeader>) -> usize {
        ptr.as_ptr() as usize
    }
}

/// Rounds `value` up to the next multiple of `unit`. `unit` must be a power
/// of two.
#[inline]
pub(crate) fn align_up(value: usize, unit: usize) -> usize {
    (value + unit - 1) & !(unit - 1)
}
