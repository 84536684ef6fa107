//! Heap inspection: block iteration, statistics and the consistency checker.

use crate::{
  align::DOUBLE_WORD,
  block::{Block, MIN_BLOCK, Tag},
  error::HeapError,
  implicit::ImplicitAllocator,
  source::MemorySource,
};

/// Summary of the heap produced by [`ImplicitAllocator::check`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes spanned by the heap region, sentinels included.
  pub heap_size: usize,
  /// Blocks between the prologue and the epilogue.
  pub blocks: usize,
  pub free_blocks: usize,
  /// Sum of free block sizes, metadata included.
  pub free_bytes: usize,
  /// Sum of allocated block sizes, metadata included.
  pub allocated_bytes: usize,
  pub largest_free: usize,
}

/// One block as seen by [`ImplicitAllocator::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub payload: *mut u8,
  pub size: usize,
  pub allocated: bool,
}

/// Iterator over the blocks of a heap, in address order, sentinels excluded.
pub struct Blocks<'a, S: MemorySource> {
  allocator: &'a ImplicitAllocator<S>,
  current: Option<Block>,
}

impl<S: MemorySource> Iterator for Blocks<'_, S> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let block = self.current?;

    unsafe {
      if block.payload() >= self.allocator.heap_hi || block.size() == 0 {
        self.current = None;
        return None;
      }

      let tag = block.header();
      self.current = Some(block.next());

      Some(BlockInfo {
        payload: block.payload(),
        size: tag.size,
        allocated: tag.allocated,
      })
    }
  }
}

impl<S: MemorySource> ImplicitAllocator<S> {
  pub fn blocks(&self) -> Blocks<'_, S> {
    Blocks {
      allocator: self,
      current: self.prologue.map(|prologue| unsafe { prologue.next() }),
    }
  }

  /// Walks the whole heap and verifies its invariants:
  ///
  /// - the prologue and epilogue are intact and the epilogue ends the region;
  /// - every block is aligned, at least [`MIN_BLOCK`] bytes, a multiple of a
  ///   double word and fully inside the region;
  /// - every header matches its footer;
  /// - no two free blocks are adjacent.
  pub fn check(&self) -> Result<HeapStats, HeapError> {
    let prologue = self.prologue.ok_or(HeapError::NotInitialized)?;
    let heap_hi = self.heap_hi as usize;
    let offset = |block: Block| block.payload() as usize - self.heap_lo as usize;

    let mut stats = HeapStats {
      heap_size: self.heap_size(),
      ..HeapStats::default()
    };

    unsafe {
      let (header, footer) = (prologue.header(), prologue.footer());
      if header != Tag::new(DOUBLE_WORD, true) || footer != header {
        return Err(HeapError::BadPrologue { header, footer });
      }

      let mut previous_free: Option<Block> = None;
      let mut current = prologue.next();

      loop {
        let at = offset(current);
        let payload = current.payload() as usize;

        if payload > heap_hi {
          return Err(HeapError::OutOfBounds { offset: at });
        }
        if payload % DOUBLE_WORD != 0 {
          return Err(HeapError::Misaligned { offset: at });
        }

        let header = current.header();
        if header.size == 0 {
          if !header.allocated || payload != heap_hi {
            return Err(HeapError::BadEpilogue { offset: at, tag: header });
          }
          break;
        }

        if header.size % DOUBLE_WORD != 0 || header.size < MIN_BLOCK {
          return Err(HeapError::BadSize {
            offset: at,
            size: header.size,
          });
        }
        if payload + header.size > heap_hi {
          return Err(HeapError::OutOfBounds { offset: at });
        }

        let footer = current.footer();
        if footer != header {
          return Err(HeapError::TagMismatch {
            offset: at,
            header,
            footer,
          });
        }

        stats.blocks += 1;
        if header.allocated {
          stats.allocated_bytes += header.size;
          previous_free = None;
        } else {
          if let Some(previous) = previous_free {
            return Err(HeapError::Uncoalesced {
              first: offset(previous),
              second: at,
            });
          }
          stats.free_blocks += 1;
          stats.free_bytes += header.size;
          stats.largest_free = stats.largest_free.max(header.size);
          previous_free = Some(current);
        }

        current = current.next();
      }
    }

    Ok(stats)
  }

  /// Prints every block of the heap to stdout.
  pub fn print_heap(&self) {
    println!(
      "heap {:?}..{:?} ({} bytes)",
      self.heap_lo,
      self.heap_hi,
      self.heap_size()
    );

    for block in self.blocks() {
      println!(
        "  {:?}  {:>8} bytes  {}",
        block.payload,
        block.size,
        if block.allocated { "allocated" } else { "free" }
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::Arena;

  fn heap() -> ImplicitAllocator<Arena> {
    let mut allocator = ImplicitAllocator::new(Arena::new(16 * 1024));
    allocator.init().unwrap();
    allocator
  }

  #[test]
  fn test_check_before_init() {
    let allocator = ImplicitAllocator::new(Arena::new(1024));
    assert_eq!(allocator.check(), Err(HeapError::NotInitialized));
    assert_eq!(allocator.blocks().count(), 0);
  }

  #[test]
  fn test_blocks_in_address_order() {
    let mut allocator = heap();

    let a = allocator.allocate(8);
    let b = allocator.allocate(100);

    let blocks: Vec<BlockInfo> = allocator.blocks().collect();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0], BlockInfo { payload: a, size: 16, allocated: true });
    assert_eq!(blocks[1], BlockInfo { payload: b, size: 112, allocated: true });
    assert_eq!(blocks[2].size, 4096 - 16 - 112);
    assert!(!blocks[2].allocated);

    let stats = allocator.check().unwrap();
    assert_eq!(stats.allocated_bytes, 128);
    assert_eq!(stats.largest_free, 4096 - 128);
  }

  #[test]
  fn test_detects_tag_mismatch() {
    let mut allocator = heap();
    let a = allocator.allocate(8);

    // Overwrite the footer, which sits right after the 8-byte payload.
    unsafe { (a.add(8) as *mut u32).write(24 | 1) };

    assert_eq!(
      allocator.check(),
      Err(HeapError::TagMismatch {
        offset: 16,
        header: Tag::new(16, true),
        footer: Tag::new(24, true),
      })
    );
  }

  #[test]
  fn test_detects_adjacent_free_blocks() {
    let mut allocator = heap();
    let a = allocator.allocate(8);

    // Mark the block free without coalescing it with the free tail.
    unsafe {
      (a.sub(4) as *mut u32).write(16);
      (a.add(8) as *mut u32).write(16);
    }

    assert_eq!(
      allocator.check(),
      Err(HeapError::Uncoalesced { first: 16, second: 32 })
    );
  }

  #[test]
  fn test_detects_bad_size() {
    let mut allocator = heap();
    let a = allocator.allocate(8);

    unsafe { (a.sub(4) as *mut u32).write(8 | 1) };

    assert_eq!(
      allocator.check(),
      Err(HeapError::BadSize { offset: 16, size: 8 })
    );
  }

  #[test]
  fn test_detects_broken_epilogue() {
    let allocator = heap();

    unsafe { (allocator.heap_hi.sub(4) as *mut u32).write(0) };

    assert_eq!(
      allocator.check(),
      Err(HeapError::BadEpilogue {
        offset: allocator.heap_size(),
        tag: Tag::new(0, false),
      })
    );
  }
}
