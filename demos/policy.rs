//! Run with `ALLOCATOR_ALGORITHM=best_fit cargo run --example policy` to
//! see placement policy selection affect which free block is reused.

use regionalloc::Allocator;

fn main() {
    let allocator = Allocator::new();

    let small_slot = allocator.allocate(50);
    // Kept allocated so the two freed slots below stay non-adjacent:
    // adjacent free blocks would otherwise coalesce into one, leaving only
    // a single candidate and nothing for the policies to diverge over.
    let keep_used = allocator.allocate(8);
    let large_slot = allocator.allocate(200);

    allocator.free(small_slot);
    allocator.free(large_slot);

    let reused = allocator.allocate(40);
    println!("reused payload at {reused:?}");

    allocator.free(keep_used);
    allocator.free(reused);
}
