use std::{io::Read, ptr};

use implicit_alloc::{ImplicitAllocator, Sbrk, print_alloc};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `gdb`, or just visually track how the program break moves.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    Sbrk::program_break(),
  );
}

fn main() {
  env_logger::init();

  let mut allocator = ImplicitAllocator::new(Sbrk::new());

  print_program_break("start");
  if let Err(err) = allocator.init() {
    eprintln!("cannot initialize heap: {err}");
    return;
  }
  print_program_break("after init");
  allocator.print_heap();
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Three small blocks, carved from the first chunk.
  // --------------------------------------------------------------------
  let a = allocator.allocate(24);
  let b = allocator.allocate(24);
  let c = allocator.allocate(24);
  println!("\n[1] Allocate three 24 byte blocks");
  for address in [a, b, c] {
    print_alloc(24, address);
  }

  unsafe {
    ptr::write_bytes(a, 0xAA, 24);
    ptr::write_bytes(b, 0xBB, 24);
    ptr::write_bytes(c, 0xCC, 24);
  }
  allocator.print_heap();
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Release A, then C, then B. B's release merges all three.
  // --------------------------------------------------------------------
  unsafe {
    allocator.release(a);
    println!("\n[2] Released A");
    allocator.print_heap();

    allocator.release(c);
    println!("\n[2] Released C (merges with the free tail)");
    allocator.print_heap();

    allocator.release(b);
    println!("\n[2] Released B (merges with both neighbours)");
    allocator.print_heap();
  }
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) First fit reuses the start of the heap.
  // --------------------------------------------------------------------
  let d = allocator.allocate(16);
  println!("\n[3] Allocate 16 bytes");
  print_alloc(16, d);
  println!(
    "[3] d == a? {}",
    if d == a {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A request larger than the free space grows the heap.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");
  let big = allocator.allocate(64 * 1024);
  println!("\n[4] Allocate 64 KiB");
  print_alloc(64 * 1024, big);
  print_program_break("after large alloc");
  allocator.print_heap();

  match allocator.check() {
    Ok(stats) => println!("\n[4] Heap is consistent: {stats:?}"),
    Err(err) => println!("\n[4] Heap is corrupted: {err}"),
  }
  block_until_enter_pressed();

  println!("\n[5] End of example. Process will exit and the OS will reclaim all memory.");
}
