use std::ptr;

use chunkalloc::{AllocFn, Arena, ArenaConfig, LimitedArena, arena_realloc, limited_realloc};
use libc::c_void;

/// A stand-in for an embedded runtime: it only knows the hook and the
/// opaque user data, never the arena type.
struct Host {
  alloc: AllocFn,
  ud: *mut c_void,
}

impl Host {
  unsafe fn realloc(
    &self,
    ptr: *mut c_void,
    osize: usize,
    nsize: usize,
  ) -> *mut c_void {
    unsafe { (self.alloc)(self.ud, ptr, osize, nsize) }
  }
}

fn print_stats(
  label: &str,
  arena: &Arena,
) {
  let stats = arena.stats();
  println!(
    "[{}] chunks = {}, capacity = {}, live = {} bytes in {} blocks, free blocks = {}, total = {}",
    label,
    stats.chunks,
    stats.capacity,
    stats.live_bytes,
    stats.live_blocks,
    stats.free_blocks,
    stats.total_allocated,
  );
}

fn main() {
  let arena = Arena::with_config(ArenaConfig::default().chunk_size(4 * 1024)).unwrap();
  let host = Host {
    alloc: arena_realloc,
    ud: arena.as_user_data(),
  };

  unsafe {
    print_stats("start", &arena);

    // --------------------------------------------------------------------
    // 1) Three fresh allocations, bumped one after the other.
    // --------------------------------------------------------------------
    let first = host.realloc(ptr::null_mut(), 0, 100);
    let second = host.realloc(ptr::null_mut(), 0, 200);
    let third = host.realloc(ptr::null_mut(), 0, 24);
    println!("\n[1] first = {:?}, second = {:?}, third = {:?}", first, second, third);
    ptr::write_bytes(first as *mut u8, 0xAB, 100);
    print_stats("1", &arena);

    // --------------------------------------------------------------------
    // 2) Free the first block and ask for a slightly smaller one: the
    //    first-fit search hands the same region back.
    // --------------------------------------------------------------------
    host.realloc(first, 100, 0);
    let reused = host.realloc(ptr::null_mut(), 0, 90);
    println!(
      "\n[2] reused == first? {}",
      if reused == first { "Yes, the freed block was reused" } else { "No" }
    );
    print_stats("2", &arena);

    // --------------------------------------------------------------------
    // 3) Grow the last block: it sits at the bump edge, so it grows in place.
    // --------------------------------------------------------------------
    let grown = host.realloc(third, 24, 512);
    println!("\n[3] grew third in place? {}", grown == third);

    // --------------------------------------------------------------------
    // 4) Grow a block in the middle: no room, so it is copied elsewhere.
    // --------------------------------------------------------------------
    ptr::write_bytes(second as *mut u8, 0x42, 200);
    let moved = host.realloc(second, 200, 1000);
    println!(
      "\n[4] second moved from {:?} to {:?}, first byte = 0x{:X}",
      second,
      moved,
      *(moved as *const u8)
    );
    print_stats("4", &arena);

    // --------------------------------------------------------------------
    // 5) Shrinking never moves data; the tail joins the free list.
    // --------------------------------------------------------------------
    let shrunk = host.realloc(moved, 1000, 64);
    println!("\n[5] shrunk in place? {}", shrunk == moved);
    print_stats("5", &arena);

    // --------------------------------------------------------------------
    // 6) A pointer that was already freed is refused.
    // --------------------------------------------------------------------
    let refused = host.realloc(second, 200, 300);
    println!("\n[6] realloc of a freed pointer returned {:?}", refused);
  }

  arena.reset();
  print_stats("reset", &arena);

  // ----------------------------------------------------------------------
  // 7) A memory capped arena behind the same hook shape.
  // ----------------------------------------------------------------------
  let limited = LimitedArena::new(Arena::new().unwrap(), 16 * 1024);
  let host = Host {
    alloc: limited_realloc,
    ud: limited.as_user_data(),
  };

  let mut granted = 0;
  unsafe {
    while !host.realloc(ptr::null_mut(), 0, 1000).is_null() {
      granted += 1;
    }
  }
  println!(
    "\n[7] limit of {} bytes allowed {} blocks of 1000 bytes",
    limited.limit(),
    granted
  );
  print_stats("limited", limited.arena());

  println!("\n[8] End of demo. Dropping the arenas releases every chunk.");
}
