use std::ptr::{self, NonNull};

use log::{debug, trace, warn};

use crate::{
  align,
  align::{DOUBLE_WORD, WORD},
  block::{Block, MAX_BLOCK, MIN_BLOCK, Tag},
  config::Config,
  error::HeapError,
  source::MemorySource,
};

/// First-fit allocator over an implicit free list.
///
/// The heap is one contiguous region obtained from `S`. Blocks carry their
/// size and status in a header and a footer, so the block sequence is walked
/// by address arithmetic alone and free neighbours are merged as soon as a
/// block is released.
pub struct ImplicitAllocator<S: MemorySource> {
  pub(crate) source: S,
  pub(crate) config: Config,
  /// The prologue block. `None` until [`init`](Self::init) succeeds.
  pub(crate) prologue: Option<Block>,
  /// First byte received from the source, after alignment padding.
  pub(crate) heap_lo: *mut u8,
  /// One past the last byte received from the source.
  pub(crate) heap_hi: *mut u8,
}

impl<S: MemorySource> ImplicitAllocator<S> {
  pub fn new(source: S) -> Self {
    Self::with_config(source, Config::default())
  }

  pub fn with_config(
    source: S,
    config: Config,
  ) -> Self {
    Self {
      source,
      config,
      prologue: None,
      heap_lo: ptr::null_mut(),
      heap_hi: ptr::null_mut(),
    }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn is_initialized(&self) -> bool {
    self.prologue.is_some()
  }

  /// Total bytes currently spanned by the heap region.
  pub fn heap_size(&self) -> usize {
    if !self.is_initialized() {
      return 0;
    }
    self.heap_hi as usize - self.heap_lo as usize
  }

  /// Lays out the prologue and epilogue and grows the heap by one chunk.
  ///
  /// ```text
  ///   heap_lo
  ///   ▼
  ///   ┌─────────┬────────────┬────────────┬────────────┐
  ///   │ padding │ 8/1 header │ 8/1 footer │ 0/1 header │
  ///   └─────────┴────────────┴────────────┴────────────┘
  ///               prologue                  epilogue
  /// ```
  pub fn init(&mut self) -> Result<(), HeapError> {
    if self.is_initialized() {
      return Err(HeapError::AlreadyInitialized);
    }

    let prologue = self.lay_out().inspect_err(|_| {
      self.heap_lo = ptr::null_mut();
      self.heap_hi = ptr::null_mut();
    })?;

    self.prologue = Some(prologue);
    debug!(
      "heap initialized at {:?}, {} bytes",
      self.heap_lo,
      self.heap_size()
    );

    Ok(())
  }

  fn lay_out(&mut self) -> Result<Block, HeapError> {
    let mut start = self.grow(4 * WORD)?.as_ptr();

    let misalignment = start as usize % DOUBLE_WORD;
    if misalignment != 0 {
      let padding = DOUBLE_WORD - misalignment;
      self.grow(padding)?;
      start = unsafe { start.add(padding) };
    }
    self.heap_lo = start;

    let prologue = unsafe {
      Block::clear_word(start);

      let prologue = Block::from_payload(NonNull::new_unchecked(start.add(2 * WORD)));
      prologue.write(DOUBLE_WORD, true);
      prologue.next().write_header(Tag::new(0, true));
      prologue
    };

    let words = self.config.chunk_size / WORD;
    let first_chunk = unsafe { self.extend(words) };
    if first_chunk.is_none() {
      return Err(HeapError::OutOfMemory {
        requested: words * WORD,
      });
    }

    Ok(prologue)
  }

  /// Allocates at least `size` bytes and returns a pointer to the payload,
  /// aligned to a double word.
  ///
  /// Returns null when `size` is zero, when the allocator has not been
  /// initialized, or when the memory source refuses to grow the heap.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 || !self.is_initialized() {
      return ptr::null_mut();
    }

    let Some(asize) = adjusted_size(size) else {
      warn!("allocation of {} bytes exceeds the largest block", size);
      return ptr::null_mut();
    };

    unsafe {
      if let Some(block) = self.find_fit(asize) {
        self.place(block, asize);
        return block.payload();
      }

      let extend_size = asize.max(self.config.chunk_size);
      let Some(block) = self.extend(extend_size / WORD) else {
        warn!("allocation of {} bytes failed: heap cannot grow", size);
        return ptr::null_mut();
      };

      self.place(block, asize);
      block.payload()
    }
  }

  /// Releases a block and merges it with any free neighbour.
  ///
  /// # Safety
  ///
  /// `address` must have been returned by [`allocate`](Self::allocate) on
  /// this allocator and not released since. Null is ignored.
  pub unsafe fn release(
    &mut self,
    address: *mut u8,
  ) {
    let Some(payload) = NonNull::new(address) else {
      return;
    };

    unsafe {
      let block = Block::from_payload(payload);
      let size = block.size();

      block.write(size, false);
      self.coalesce(block);
    }
  }

  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let start = self
      .source
      .grow(bytes)
      .ok_or(HeapError::OutOfMemory { requested: bytes })?;

    self.heap_hi = unsafe { start.as_ptr().add(bytes) };
    Ok(start)
  }

  /// Grows the heap by `words` (rounded up to an even count) and returns the
  /// resulting free block, already merged with a free block that ended the
  /// old heap.
  ///
  /// When that merge would exceed [`MAX_BLOCK`], only the bytes that bring
  /// the merged block to exactly `MAX_BLOCK` are requested.
  unsafe fn extend(
    &mut self,
    words: usize,
  ) -> Option<Block> {
    let mut size = if words % 2 == 1 { (words + 1) * WORD } else { words * WORD };

    let last = unsafe { Block::from_payload(NonNull::new(self.heap_hi)?).prev() };
    let last_tag = unsafe { last.header() };
    if !last_tag.allocated && last_tag.size + size > MAX_BLOCK {
      size = MAX_BLOCK - last_tag.size;
      trace!("extension capped at {} bytes to keep blocks encodable", size);
      if size == 0 {
        return None;
      }
    }

    let start = self.grow(size).ok()?;
    debug!("heap extended by {} bytes at {:?}", size, start);

    unsafe {
      // The old epilogue header becomes the header of the new block.
      let block = Block::from_payload(start);
      block.write(size, false);
      block.next().write_header(Tag::new(0, true));

      Some(self.coalesce(block))
    }
  }

  unsafe fn find_fit(
    &self,
    asize: usize,
  ) -> Option<Block> {
    let mut current = self.prologue?;

    unsafe {
      while current.size() > 0 {
        if !current.is_allocated() && current.size() >= asize {
          return Some(current);
        }
        current = current.next();
      }
    }

    None
  }

  unsafe fn place(
    &mut self,
    block: Block,
    asize: usize,
  ) {
    unsafe {
      let csize = block.size();

      if csize - asize >= MIN_BLOCK {
        trace!("split {} byte block into {} + {}", csize, asize, csize - asize);
        block.write(asize, true);
        block.next().write(csize - asize, false);
      } else {
        trace!("place {} bytes into {} byte block", asize, csize);
        block.write(csize, true);
      }
    }
  }

  unsafe fn coalesce(
    &mut self,
    block: Block,
  ) -> Block {
    unsafe {
      let prev = block.prev();
      let next = block.next();
      let mut size = block.size();

      match (prev.is_allocated(), next.is_allocated()) {
        (true, true) => block,
        (true, false) => {
          trace!("coalesce {:?} with next", block.payload());
          size += next.size();
          block.write(size, false);
          block
        }
        (false, true) => {
          trace!("coalesce {:?} with previous", block.payload());
          size += prev.size();
          prev.write(size, false);
          prev
        }
        (false, false) => {
          trace!("coalesce {:?} with both neighbours", block.payload());
          size += prev.size() + next.size();
          prev.write(size, false);
          prev
        }
      }
    }
  }
}

/// Block size needed for a `size`-byte payload: header and footer added,
/// rounded to a double word, at least [`MIN_BLOCK`].
fn adjusted_size(size: usize) -> Option<usize> {
  if size <= DOUBLE_WORD {
    return Some(MIN_BLOCK);
  }

  let with_tags = size.checked_add(DOUBLE_WORD)?;
  (with_tags <= MAX_BLOCK).then(|| align!(with_tags))
}
