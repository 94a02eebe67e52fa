use std::mem;

use crate::align::ALIGNMENT;

/// Sentinel stored in every live block header.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Bytes consumed by the header in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

/// Smallest tail worth tracking as a free block.
pub const MIN_SPLIT: usize = HEADER_SIZE + ALIGNMENT;

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);

/// Metadata written immediately before the pointer handed to the caller.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockHeader {
  pub size: usize,
  pub magic: u32,
}

impl BlockHeader {
  pub fn new(size: usize) -> Self {
    Self { size, magic: MAGIC }
  }

  pub fn is_live(&self) -> bool {
    self.magic == MAGIC
  }
}

/// A reusable region inside one chunk. `size` includes the space a header
/// will occupy once the region is handed out again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
  pub chunk: usize,
  pub offset: usize,
  pub size: usize,
}

impl FreeBlock {
  pub fn new(
    chunk: usize,
    offset: usize,
    size: usize,
  ) -> Self {
    Self { chunk, offset, size }
  }

  pub fn end(&self) -> usize {
    self.offset + self.size
  }

  /// True when the two blocks live in the same chunk and share a boundary.
  pub fn touches(
    &self,
    other: &FreeBlock,
  ) -> bool {
    self.chunk == other.chunk && (self.end() == other.offset || other.end() == self.offset)
  }

  pub fn overlaps(
    &self,
    other: &FreeBlock,
  ) -> bool {
    self.chunk == other.chunk && self.offset < other.end() && other.offset < self.end()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_layout() {
    assert_eq!(HEADER_SIZE % ALIGNMENT, 0);
    assert!(HEADER_SIZE >= mem::size_of::<usize>() + mem::size_of::<u32>());
    assert!(BlockHeader::new(64).is_live());
  }

  #[test]
  fn test_touches_same_chunk_only() {
    let a = FreeBlock::new(0, 0, 32);
    let b = FreeBlock::new(0, 32, 16);
    let c = FreeBlock::new(1, 32, 16);
    let d = FreeBlock::new(0, 56, 8);

    assert!(a.touches(&b));
    assert!(b.touches(&a));
    assert!(!a.touches(&c));
    assert!(!a.touches(&d));
    assert!(!a.overlaps(&b));
    assert!(a.overlaps(&FreeBlock::new(0, 24, 16)));
  }
}
