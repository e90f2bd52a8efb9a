use regionalloc::Allocator;

fn log_alloc(label: &str, addr: *mut u8, size: usize) {
    println!("{label}: requested {size} bytes, got {addr:?}");
}

fn main() {
    let allocator = Allocator::new();

    let addr1 = allocator.allocate(8);
    log_alloc("u64", addr1, 8);

    let addr2 = allocator.named_allocate(16, "scratch buffer");
    log_alloc("named", addr2, 16);

    let addr3 = allocator.zeroed_allocate(4, 4);
    log_alloc("zeroed", addr3, 16);

    allocator.dump_state();

    allocator.free(addr1);
    allocator.free(addr2);
    allocator.free(addr3);
}
