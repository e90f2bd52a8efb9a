//! End-to-end scenarios, exercised through the public `Allocator` surface.
//!
//! Tests that read `ALLOCATOR_ALGORITHM` share a process-wide environment,
//! so they serialize on `ENV_LOCK` to avoid racing each other.

use std::sync::Mutex;

use regionalloc::Allocator;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn with_algorithm<T>(value: &str, f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::set_var("ALLOCATOR_ALGORITHM", value);
    }
    let result = f();
    unsafe {
        std::env::remove_var("ALLOCATOR_ALGORITHM");
    }
    result
}

#[test]
fn three_allocations_leave_a_trailing_free_block() {
    with_algorithm("first_fit", || {
        let allocator = Allocator::new();

        let p1 = allocator.allocate(16);
        let p2 = allocator.allocate(16);
        let p3 = allocator.allocate(16);
        assert!(!p1.is_null() && !p2.is_null() && !p3.is_null());

        // Three small allocations from one fresh region leave at least one
        // more block behind: the freshly-split trailing free remainder.
        assert!(allocator.block_count() >= 4);

        allocator.free(p1);
        allocator.free(p2);
        allocator.free(p3);
        assert!(allocator.is_empty());
    });
}

#[test]
fn fit_policies_diverge_over_two_live_free_blocks() {
    // Two free blocks of different sizes must not be adjacent, since
    // adjacent free blocks always coalesce into one; a used block is kept
    // between them so both survive independently.
    let allocator = Allocator::new();

    let small_slot = with_algorithm("first_fit", || allocator.allocate(50));
    let keep_used = with_algorithm("first_fit", || allocator.allocate(64));
    let large_slot = with_algorithm("first_fit", || allocator.allocate(200));
    allocator.free(small_slot);
    allocator.free(large_slot);

    let first = with_algorithm("first_fit", || allocator.allocate(40));
    allocator.free(first);
    let first_again = with_algorithm("first_fit", || allocator.allocate(40));
    assert_eq!(first, first_again);
    allocator.free(first_again);

    let best = with_algorithm("best_fit", || allocator.allocate(40));
    allocator.free(best);

    let worst = with_algorithm("worst_fit", || allocator.allocate(40));

    // first/best-fit both land in the smaller of the two free slots;
    // worst-fit must land in the larger one.
    assert_eq!(first, best);
    assert_ne!(first, worst);

    allocator.free(worst);
    allocator.free(keep_used);
    assert!(allocator.is_empty());
}

#[test]
fn split_is_refused_when_suffix_too_small() {
    let allocator = Allocator::new();

    // Pin both neighbors of `b` as permanently used, so freeing `b` alone
    // leaves it as a standalone free block of exactly 120 bytes (20 byte
    // payload + 100 byte header, already 8-aligned) instead of merging
    // back into a larger span.
    let a = allocator.allocate(8);
    let b = allocator.allocate(20);
    let c = allocator.allocate(8);
    allocator.free(b);

    let block_count_before = allocator.block_count();

    // Request 4 bytes -> aligned target 104. Suffix would be 120-104=16,
    // below the minimum splittable suffix, so the split must be refused
    // and the whole 120-byte block reused as-is.
    let reused = allocator.allocate(4);
    assert_eq!(reused, b);
    assert_eq!(allocator.block_count(), block_count_before);

    allocator.free(reused);
    allocator.free(a);
    allocator.free(c);
    assert!(allocator.is_empty());
}

#[test]
fn full_coalesce_unmaps_the_region() {
    let allocator = Allocator::new();

    let a = allocator.allocate(256);
    let b = allocator.allocate(256);
    let c = allocator.allocate(256);

    allocator.free(a);
    allocator.free(c);
    allocator.free(b);

    assert!(allocator.is_empty());
}

#[test]
fn cross_region_merge_is_forbidden() {
    let allocator = Allocator::new();

    // Large enough that each allocation forces its own region, leaving
    // only a small page-alignment remainder behind in each, far too
    // small to satisfy the probe allocation below by itself.
    const BIG: usize = 64 * 1024 * 1024;
    const PROBE: usize = 32 * 1024 * 1024;

    let a = allocator.allocate(BIG);
    let b = allocator.allocate(BIG);
    assert!(!a.is_null() && !b.is_null());

    let count_before_free = allocator.block_count();

    // Freeing `b` fully frees and unmaps its own region. Its neighbor in
    // the global list, `a`'s leftover remainder, must not absorb any of
    // that released space.
    allocator.free(b);

    // `a`'s remainder alone cannot satisfy PROBE, so a correct
    // implementation must map a fresh third region for it. If the
    // just-released region had illegally merged into `a`'s free
    // remainder instead of being unmapped outright, PROBE would fit
    // there and no new region would be needed.
    let probe = allocator.allocate(PROBE);
    assert!(!probe.is_null());

    // A fresh region was mapped for the probe (one new used block plus
    // its own free remainder), exactly replacing the two blocks that
    // `free(b)` released: the block count returns to what it was before
    // `b` was freed. A cross-region merge would instead have grown `a`'s
    // remainder large enough to satisfy PROBE by splitting it in place,
    // leaving the count one short of `count_before_free`.
    assert_eq!(allocator.block_count(), count_before_free);

    allocator.free(a);
    allocator.free(probe);
    assert!(allocator.is_empty());
}

#[test]
fn resize_identity_preserves_bytes() {
    let allocator = Allocator::new();
    let p = allocator.allocate(48);
    unsafe {
        for i in 0..48u8 {
            *p.add(i as usize) = i;
        }
    }

    let resized = allocator.resize(p, 48);
    assert!(!resized.is_null());
    unsafe {
        for i in 0..48u8 {
            assert_eq!(*resized.add(i as usize), i);
        }
    }
    allocator.free(resized);
}

#[test]
fn scribble_fills_fresh_payload_with_0xaa() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::set_var("ALLOCATOR_SCRIBBLE", "1");
    }

    let allocator = Allocator::new();
    let p = allocator.allocate(32);
    assert!(!p.is_null());
    unsafe {
        for i in 0..32 {
            assert_eq!(*p.add(i), 0xAA);
        }
    }
    allocator.free(p);

    unsafe {
        std::env::remove_var("ALLOCATOR_SCRIBBLE");
    }
}

#[test]
fn free_null_is_idempotent_no_op() {
    let allocator = Allocator::new();
    allocator.free(std::ptr::null_mut());
    allocator.free(std::ptr::null_mut());
    assert!(allocator.is_empty());
}

#[test]
fn named_allocate_truncates_long_labels() {
    let allocator = Allocator::new();
    let long_name = "x".repeat(80);
    let p = allocator.named_allocate(16, &long_name);
    assert!(!p.is_null());
    allocator.free(p);
}
