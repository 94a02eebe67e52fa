use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use log::debug;

use crate::align::ALIGNMENT;
use crate::block::{BlockHeader, HEADER_SIZE};
use crate::error::ArenaError;

/// One contiguous backing buffer plus its bump cursor.
///
/// ```text
///   base                          base + offset           base + capacity
///   ┌────────┬─────────┬────────┬──────────┬────────────────────────────┐
///   │ header │ payload │ header │ payload  │        untouched           │
///   └────────┴─────────┴────────┴──────────┴────────────────────────────┘
///                                          ▲
///                                          └── next bump allocation
/// ```
///
/// The buffer comes straight from the global allocator so the arena never
/// holds a Rust reference into memory that callers write through.
pub(crate) struct Chunk {
  base: NonNull<u8>,
  layout: Layout,
  pub offset: usize,
}

impl Chunk {
  pub fn new(capacity: usize) -> Result<Self, ArenaError> {
    if capacity == 0 {
      return Err(ArenaError::InvalidConfig("chunk capacity must be non-zero"));
    }

    let layout = Layout::from_size_align(capacity, ALIGNMENT)
      .map_err(|_| ArenaError::OutOfMemory { requested: capacity })?;

    // zeroed so a header lookup never reads uninitialized bytes
    let raw = unsafe { alloc::alloc_zeroed(layout) };
    let base = NonNull::new(raw).ok_or(ArenaError::OutOfMemory { requested: capacity })?;

    debug!("chunk of {} bytes at {:p}", capacity, base);

    Ok(Self {
      base,
      layout,
      offset: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  pub fn remaining(&self) -> usize {
    self.capacity() - self.offset
  }

  /// Advances the cursor by `size` bytes, returning the old cursor.
  pub fn bump(
    &mut self,
    size: usize,
  ) -> Option<usize> {
    if size > self.remaining() {
      return None;
    }

    let start = self.offset;
    self.offset += size;
    Some(start)
  }

  pub fn ptr_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset <= self.capacity());
    unsafe { self.base.add(offset) }
  }

  /// Maps a payload address back to the offset of its header, provided the
  /// header starts inside this chunk and the payload starts at or below the
  /// bump cursor.
  pub fn header_offset_of(
    &self,
    addr: usize,
  ) -> Option<usize> {
    let start = self.base.as_ptr() as usize;
    let header = addr.checked_sub(HEADER_SIZE)?;

    if header < start || addr > start + self.offset {
      return None;
    }

    Some(header - start)
  }

  /// # Safety
  ///
  /// `offset + HEADER_SIZE` must not exceed the chunk capacity.
  pub unsafe fn read_header(
    &self,
    offset: usize,
  ) -> BlockHeader {
    debug_assert!(offset + HEADER_SIZE <= self.capacity());
    unsafe { ptr::read_unaligned(self.ptr_at(offset).as_ptr() as *const BlockHeader) }
  }

  /// # Safety
  ///
  /// `offset + HEADER_SIZE` must not exceed the chunk capacity and the range
  /// must not overlap a live payload.
  pub unsafe fn write_header(
    &mut self,
    offset: usize,
    header: BlockHeader,
  ) {
    debug_assert!(offset + HEADER_SIZE <= self.capacity());
    unsafe { ptr::write_unaligned(self.ptr_at(offset).as_ptr() as *mut BlockHeader, header) }
  }
}

// The buffer is owned exclusively by the chunk.
unsafe impl Send for Chunk {}

impl Drop for Chunk {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bump() {
    let mut chunk = Chunk::new(64).unwrap();

    assert_eq!(chunk.bump(24), Some(0));
    assert_eq!(chunk.bump(32), Some(24));
    assert_eq!(chunk.remaining(), 8);
    assert_eq!(chunk.bump(16), None);
    assert_eq!(chunk.offset, 56);
    assert_eq!(chunk.ptr_at(0).as_ptr() as usize % ALIGNMENT, 0);
  }

  #[test]
  fn test_header_round_trip() {
    let mut chunk = Chunk::new(128).unwrap();
    chunk.bump(HEADER_SIZE + 16).unwrap();

    unsafe {
      chunk.write_header(0, BlockHeader::new(16));
      assert_eq!(chunk.read_header(0), BlockHeader::new(16));
    }
  }

  #[test]
  fn test_header_offset_of() {
    let mut chunk = Chunk::new(128).unwrap();
    let base = chunk.ptr_at(0).as_ptr() as usize;

    // nothing bumped yet, so no payload can exist
    assert_eq!(chunk.header_offset_of(base + HEADER_SIZE), None);

    chunk.bump(HEADER_SIZE + 32).unwrap();

    assert_eq!(chunk.header_offset_of(base + HEADER_SIZE), Some(0));
    assert_eq!(chunk.header_offset_of(base), None);
    assert_eq!(chunk.header_offset_of(base + 1024), None);
  }

  #[test]
  fn test_rejects_overflowing_capacity() {
    assert!(matches!(
      Chunk::new(usize::MAX),
      Err(ArenaError::OutOfMemory { .. })
    ));
  }
}
