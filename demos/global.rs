use regionalloc::Allocator;

#[global_allocator]
static ALLOCATOR: Allocator = Allocator::new();

fn main() {
    let v: Vec<u32> = (0..16).collect();
    println!("{v:?}");
}
