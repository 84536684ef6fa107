//! Boundary-tag accessors.
//!
//! Every read or write of heap metadata goes through [`Block`] and [`Tag`].
//! The rest of the crate never computes a header or footer address itself.
//!
//! ```text
//!          header                                   footer
//!   ┌──────────────┬──────────────────────────────┬──────────────┐
//!   │ size | alloc │           payload            │ size | alloc │
//!   └──────────────┴──────────────────────────────┴──────────────┘
//!                  ▲                              ▲
//!                  payload                        payload + size - 8
//! ```

use std::ptr::{self, NonNull};

use crate::align::{DOUBLE_WORD, WORD};

/// Smallest block able to hold a header, a footer and an aligned payload.
pub const MIN_BLOCK: usize = 2 * DOUBLE_WORD;

/// Largest block size a metadata word can encode.
pub const MAX_BLOCK: usize = (u32::MAX as usize) & !(DOUBLE_WORD - 1);

const ALLOCATED_BIT: u32 = 0x1;
const SIZE_MASK: u32 = !0x7;

/// Decoded content of a header or footer word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
}

impl Tag {
  pub fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  fn pack(self) -> u32 {
    debug_assert!(self.size <= MAX_BLOCK && self.size % DOUBLE_WORD == 0);
    self.size as u32 | if self.allocated { ALLOCATED_BIT } else { 0 }
  }

  fn unpack(word: u32) -> Self {
    Self {
      size: (word & SIZE_MASK) as usize,
      allocated: word & ALLOCATED_BIT != 0,
    }
  }
}

/// A block, identified by its payload address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block(NonNull<u8>);

impl Block {
  pub fn from_payload(payload: NonNull<u8>) -> Self {
    Self(payload)
  }

  pub fn payload(self) -> *mut u8 {
    self.0.as_ptr()
  }

  unsafe fn read_word(at: *mut u8) -> u32 {
    unsafe { ptr::read(at as *mut u32) }
  }

  unsafe fn write_word(
    at: *mut u8,
    word: u32,
  ) {
    unsafe { ptr::write(at as *mut u32, word) }
  }

  /// Zeroes the word at `at`. Used for the alignment padding before the prologue.
  pub unsafe fn clear_word(at: *mut u8) {
    unsafe { Self::write_word(at, 0) }
  }

  unsafe fn header_addr(self) -> *mut u8 {
    unsafe { self.payload().sub(WORD) }
  }

  unsafe fn footer_addr(self) -> *mut u8 {
    unsafe { self.payload().add(self.size()).sub(DOUBLE_WORD) }
  }

  pub unsafe fn header(self) -> Tag {
    unsafe { Tag::unpack(Self::read_word(self.header_addr())) }
  }

  pub unsafe fn footer(self) -> Tag {
    unsafe { Tag::unpack(Self::read_word(self.footer_addr())) }
  }

  pub unsafe fn size(self) -> usize {
    unsafe { self.header().size }
  }

  pub unsafe fn is_allocated(self) -> bool {
    unsafe { self.header().allocated }
  }

  /// Writes only the header. Sentinels whose footer would overlap another
  /// block's metadata use this.
  pub unsafe fn write_header(
    self,
    tag: Tag,
  ) {
    unsafe { Self::write_word(self.header_addr(), tag.pack()) }
  }

  /// Writes matching header and footer. The footer position follows from the
  /// new size, so the header goes first.
  pub unsafe fn write(
    self,
    size: usize,
    allocated: bool,
  ) {
    let tag = Tag::new(size, allocated);
    unsafe {
      self.write_header(tag);
      Self::write_word(self.footer_addr(), tag.pack());
    }
  }

  pub unsafe fn next(self) -> Block {
    unsafe { Block(NonNull::new_unchecked(self.payload().add(self.size()))) }
  }

  /// The preceding block, found through its footer just below our header.
  pub unsafe fn prev(self) -> Block {
    unsafe {
      let prev_size = Tag::unpack(Self::read_word(self.payload().sub(DOUBLE_WORD))).size;
      Block(NonNull::new_unchecked(self.payload().sub(prev_size)))
    }
  }
}
