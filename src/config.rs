use crate::align::DOUBLE_WORD;
use crate::block::{MAX_BLOCK, MIN_BLOCK};

/// Bytes requested from the memory source whenever the heap has to grow.
pub const CHUNK_SIZE: usize = 1 << 12;

/// Tunables for an [`ImplicitAllocator`](crate::ImplicitAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  pub(crate) chunk_size: usize,
}

impl Config {
  /// Sets the minimum heap extension. The value is rounded up to the
  /// double-word granularity and clamped to `[MIN_BLOCK, MAX_BLOCK]`.
  pub fn with_chunk_size(
    mut self,
    bytes: usize,
  ) -> Self {
    let bytes = bytes.clamp(MIN_BLOCK, MAX_BLOCK);
    self.chunk_size = crate::align_to!(bytes, DOUBLE_WORD);
    self
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }
}

impl Default for Config {
  fn default() -> Self {
    Self { chunk_size: CHUNK_SIZE }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_chunk() {
    assert_eq!(Config::default().chunk_size(), 4096);
  }

  #[test]
  fn test_chunk_rounding() {
    assert_eq!(Config::default().with_chunk_size(100).chunk_size(), 104);
    assert_eq!(Config::default().with_chunk_size(1).chunk_size(), MIN_BLOCK);
    assert_eq!(Config::default().with_chunk_size(usize::MAX).chunk_size(), MAX_BLOCK);
  }
}
