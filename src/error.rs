use thiserror::Error;

use crate::block::Tag;

/// Failures reported by [`ImplicitAllocator`](crate::ImplicitAllocator).
///
/// Offsets are measured in bytes from the first byte the memory source handed
/// to the allocator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeapError {
  #[error("memory source could not supply {requested} more bytes")]
  OutOfMemory { requested: usize },

  #[error("allocator is already initialized")]
  AlreadyInitialized,

  #[error("allocator is not initialized")]
  NotInitialized,

  #[error("prologue is corrupted: header {header:?}, footer {footer:?}")]
  BadPrologue { header: Tag, footer: Tag },

  #[error("epilogue at offset {offset} is corrupted: {tag:?}")]
  BadEpilogue { offset: usize, tag: Tag },

  #[error("block at offset {offset} is not double-word aligned")]
  Misaligned { offset: usize },

  #[error("block at offset {offset} has invalid size {size}")]
  BadSize { offset: usize, size: usize },

  #[error("block at offset {offset}: header {header:?} does not match footer {footer:?}")]
  TagMismatch { offset: usize, header: Tag, footer: Tag },

  #[error("free blocks at offsets {first} and {second} are adjacent")]
  Uncoalesced { first: usize, second: usize },

  #[error("block at offset {offset} runs past the end of the heap")]
  OutOfBounds { offset: usize },
}
