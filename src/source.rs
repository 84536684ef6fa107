//! Memory sources the allocator grows its heap from.

use std::ptr::NonNull;

use log::warn;

/// Supplier of raw heap bytes.
///
/// # Safety
///
/// Every successful [`grow`](MemorySource::grow) must return a pointer to
/// exactly `bytes` writable bytes that start where the previous grant ended,
/// and those bytes must stay valid for as long as the source lives. The first
/// grant may start anywhere.
pub unsafe trait MemorySource {
  /// Extends the region by `bytes`, returning the start of the new bytes, or
  /// `None` when no more memory is available.
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

/// Fixed-capacity source backed by its own heap buffer.
///
/// Bytes are handed out front to back until the capacity runs out. Several
/// arenas give several fully independent heaps.
pub struct Arena {
  base: NonNull<[u64]>,
  capacity: usize,
  used: usize,
  grow_calls: usize,
}

impl Arena {
  /// Creates an arena able to hand out `capacity` bytes in total. The
  /// capacity is rounded down to a multiple of 8.
  pub fn new(capacity: usize) -> Self {
    let words = capacity / size_of::<u64>();
    let buffer = vec![0u64; words].into_boxed_slice();
    let base = NonNull::from(Box::leak(buffer));

    Self {
      base,
      capacity: words * size_of::<u64>(),
      used: 0,
      grow_calls: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  /// Number of `grow` requests received, failed ones included.
  pub fn grow_calls(&self) -> usize {
    self.grow_calls
  }
}

unsafe impl MemorySource for Arena {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    self.grow_calls += 1;

    let end = self.used.checked_add(bytes)?;
    if end > self.capacity {
      warn!(
        "arena exhausted: {} bytes requested, {} of {} in use",
        bytes, self.used, self.capacity
      );
      return None;
    }

    let start = unsafe { (self.base.as_ptr() as *mut u8).add(self.used) };
    self.used = end;
    NonNull::new(start)
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    drop(unsafe { Box::from_raw(self.base.as_ptr()) });
  }
}

#[cfg(unix)]
pub use self::sbrk::{Sbrk, print_alloc};

#[cfg(unix)]
mod sbrk {
  use std::ptr::{self, NonNull};

  use libc::{c_void, intptr_t, sbrk};
  use log::warn;

  use super::MemorySource;

  /// Prints an allocation next to the current program break.
  pub fn print_alloc(
    size: usize,
    addr: *mut u8,
  ) {
    println!(
      "Allocated {} bytes, address = {:?}, program break = {:?}",
      size,
      addr,
      Sbrk::program_break()
    );
  }

  /// Source that moves the process's program break with `sbrk(2)`.
  ///
  /// Only one `Sbrk`-backed heap should exist per process. If anything else
  /// moves the break between two grants the second grant is refused, since it
  /// would no longer be contiguous with the heap.
  pub struct Sbrk {
    end: *mut u8,
  }

  impl Sbrk {
    pub fn new() -> Self {
      Self { end: ptr::null_mut() }
    }

    /// Current program break, as reported by `sbrk(0)`.
    pub fn program_break() -> *mut u8 {
      unsafe { sbrk(0) as *mut u8 }
    }
  }

  impl Default for Sbrk {
    fn default() -> Self {
      Self::new()
    }
  }

  unsafe impl MemorySource for Sbrk {
    fn grow(
      &mut self,
      bytes: usize,
    ) -> Option<NonNull<u8>> {
      let increment = intptr_t::try_from(bytes).ok()?;
      let address = unsafe { sbrk(increment) };

      if address == usize::MAX as *mut c_void {
        warn!("sbrk({}) failed", bytes);
        return None;
      }

      let address = address as *mut u8;
      if !self.end.is_null() && address != self.end {
        warn!(
          "program break moved from {:?} to {:?} outside of this heap",
          self.end, address
        );
        return None;
      }

      self.end = unsafe { address.add(bytes) };
      NonNull::new(address)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_grants_are_contiguous() {
    let mut arena = Arena::new(64);

    let first = arena.grow(16).unwrap();
    let second = arena.grow(24).unwrap();

    assert_eq!(first.as_ptr() as usize % 8, 0);
    assert_eq!(unsafe { first.as_ptr().add(16) }, second.as_ptr());
    assert_eq!(arena.used(), 40);
    assert_eq!(arena.grow_calls(), 2);
  }

  #[test]
  fn test_arena_exhaustion() {
    let mut arena = Arena::new(32);

    assert!(arena.grow(40).is_none());
    assert!(arena.grow(32).is_some());
    assert!(arena.grow(1).is_none());
    assert!(arena.grow(usize::MAX).is_none());
    assert_eq!(arena.used(), 32);
    assert_eq!(arena.grow_calls(), 4);
  }

  #[test]
  fn test_arena_capacity_rounds_down() {
    assert_eq!(Arena::new(70).capacity(), 64);
  }
}
