//! # implicit_alloc - An Implicit Free-List Allocator
//!
//! This crate provides a first-fit **implicit free-list allocator** with
//! boundary tags, growing its heap from a pluggable memory source such as the
//! `sbrk` system call.
//!
//! ## Overview
//!
//! Every block carries its size and allocation bit twice, in a header before
//! the payload and in a footer after it. No list pointers are stored: the next
//! block starts right after the current one, and the previous block is found
//! through its footer.
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬─────────┬─────────────────┬──────────┬─────────────────────┬─────┐
//!   │ pad │prologue │  block (alloc)  │  block   │    block (alloc)    │ epi │
//!   │     │ 8/1 8/1 │ hdr payload ftr │  (free)  │ hdr   payload   ftr │ 0/1 │
//!   └─────┴─────────┴─────────────────┴──────────┴─────────────────────┴─────┘
//!   ▲                                                                        ▲
//!   heap start                                                        heap end
//!
//!   next block = payload + size
//!   prev block = payload - size stored in the word just below our header
//! ```
//!
//! The prologue and epilogue are always-allocated sentinels, so a block at
//! either end of the heap always has a well-formed neighbour.
//!
//! ## Crate Structure
//!
//! ```text
//!   implicit_alloc
//!   ├── align      - Alignment macros (align!, align_to!) and word sizes
//!   ├── block      - Header/footer accessors (internal)
//!   ├── check      - Block iteration, statistics, consistency checker
//!   ├── config     - Allocator tunables
//!   ├── error      - HeapError
//!   ├── implicit   - ImplicitAllocator
//!   └── source     - MemorySource, Arena, Sbrk
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use implicit_alloc::{Arena, ImplicitAllocator};
//!
//! let mut allocator = ImplicitAllocator::new(Arena::new(64 * 1024));
//! allocator.init().unwrap();
//!
//! let ptr = allocator.allocate(8) as *mut u64;
//! assert!(!ptr.is_null());
//!
//! unsafe {
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//!
//!     allocator.release(ptr as *mut u8);
//! }
//!
//! assert_eq!(allocator.check().unwrap().free_blocks, 1);
//! ```
//!
//! ## How It Works
//!
//! - **Allocate**: the request is padded with 8 bytes of metadata and rounded
//!   to a double word (16 bytes minimum). The heap is scanned from the start
//!   for the first free block large enough. A remainder of at least 16 bytes
//!   is split off as a new free block. If nothing fits, the heap grows by
//!   `max(request, chunk size)` bytes.
//! - **Release**: the block is marked free and merged right away with a free
//!   predecessor, a free successor, or both. Two free blocks are never
//!   adjacent.
//! - **Grow**: the old epilogue header becomes the header of the new free
//!   block and a new epilogue is written at the end of the grant.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Never shrinks**: Memory is never handed back to the source
//! - **Linear search**: Allocation is O(number of blocks)
//! - **No realloc**: Live blocks cannot be resized
//!
//! ## Safety
//!
//! Releasing a pointer that did not come from [`ImplicitAllocator::allocate`],
//! releasing it twice, or writing past the requested size corrupts the heap.
//! None of this is detected; [`ImplicitAllocator::check`] can find the damage
//! afterwards.

pub mod align;
mod block;
mod check;
mod config;
mod error;
mod implicit;
mod source;

pub use block::{MAX_BLOCK, MIN_BLOCK, Tag};
pub use check::{BlockInfo, Blocks, HeapStats};
pub use config::{CHUNK_SIZE, Config};
pub use error::HeapError;
pub use implicit::ImplicitAllocator;
#[cfg(unix)]
pub use source::{Sbrk, print_alloc};
pub use source::{Arena, MemorySource};
