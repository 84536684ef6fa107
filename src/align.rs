/// Size in bytes of one metadata word (a block header or footer).
pub const WORD: usize = 4;

/// Size in bytes of a double word, the alignment granularity of every block.
pub const DOUBLE_WORD: usize = 8;

/// Rounds `value` up to the next multiple of `to`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use implicit_alloc::align_to;
///
/// assert_eq!(align_to!(13, 16), 16);
/// assert_eq!(align_to!(32, 16), 32);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $to:expr) => {
    ($value + $to - 1) & !($to - 1)
  };
}

/// Rounds `value` up to the double-word granularity used for block sizes.
///
/// # Examples
///
/// ```rust
/// use implicit_alloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(17), 24);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::DOUBLE_WORD)
  };
}
