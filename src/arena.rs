use std::ptr::{self, NonNull};

use log::{debug, trace, warn};

use crate::align::{ALIGNMENT, checked_align};
use crate::block::{BlockHeader, FreeBlock, HEADER_SIZE, MIN_SPLIT};
use crate::chunk::Chunk;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::guard::Exclusive;
use crate::stats::ArenaStats;

/// Chunked bump allocator with a first-fit free list.
///
/// Every public method takes `&self` and enters a call guard first, so a
/// nested call (for instance from the closure given to
/// [`Arena::for_each_free_block`]) panics rather than corrupting state.
pub struct Arena {
  state: Exclusive<State>,
}

struct State {
  config: ArenaConfig,
  chunks: Vec<Chunk>,
  current: usize,
  free_blocks: Vec<FreeBlock>,
  released: bool,
  live_bytes: usize,
  live_blocks: usize,
}

/// A live block found through its payload pointer. `offset` is the header.
#[derive(Clone, Copy, Debug)]
struct Block {
  chunk: usize,
  offset: usize,
  size: usize,
}

impl Block {
  fn end(&self) -> usize {
    self.offset + HEADER_SIZE + self.size
  }
}

impl Arena {
  /// Creates an arena with one default sized chunk.
  pub fn new() -> Result<Self, ArenaError> {
    Self::with_config(ArenaConfig::default())
  }

  pub fn with_config(config: ArenaConfig) -> Result<Self, ArenaError> {
    let config = config.validated()?;
    let first = Chunk::new(config.chunk_size)?;

    Ok(Self {
      state: Exclusive::new(State {
        config,
        chunks: vec![first],
        current: 0,
        free_blocks: Vec::new(),
        released: false,
        live_bytes: 0,
        live_blocks: 0,
      }),
    })
  }

  pub fn config(&self) -> ArenaConfig {
    self.state.enter().config
  }

  /// Unified malloc/realloc/free.
  ///
  /// - `ptr == None` allocates `new_size` bytes.
  /// - `new_size == 0` frees `ptr` and returns `None`.
  /// - otherwise the block is grown in place when possible, moved when not,
  ///   and always shrunk in place.
  pub fn realloc(
    &self,
    ptr: Option<NonNull<u8>>,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>, ArenaError> {
    let mut state = self.state.enter();
    state.ensure_usable()?;

    let Some(ptr) = ptr else {
      return state.alloc_new(new_size).map(Some);
    };

    if new_size == 0 {
      state.free(ptr)?;
      return Ok(None);
    }

    state.realloc(ptr, new_size).map(Some)
  }

  /// Allocates `size` bytes, rounded up to a multiple of 8.
  pub fn alloc(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, ArenaError> {
    let mut state = self.state.enter();
    state.ensure_usable()?;
    state.alloc_new(size)
  }

  /// Returns the block to the free list. Freeing the same pointer twice, or
  /// a pointer this arena never handed out, is reported as
  /// [`ArenaError::InvalidPointer`].
  pub fn free(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<(), ArenaError> {
    let mut state = self.state.enter();
    state.ensure_usable()?;
    state.free(ptr)
  }

  /// Payload size recorded in the block header.
  pub fn size(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<usize, ArenaError> {
    let state = self.state.enter();
    state.ensure_usable()?;
    state.locate(ptr).map(|block| block.size)
  }

  /// Rewinds every chunk and forgets the free list. Backing storage is kept
  /// and its contents are left as they are.
  pub fn reset(&self) {
    let mut state = self.state.enter();

    if state.released {
      return;
    }

    for chunk in state.chunks.iter_mut() {
      chunk.offset = 0;
    }

    state.current = 0;
    state.free_blocks.clear();
    state.live_bytes = 0;
    state.live_blocks = 0;

    debug!("arena reset, {} chunks kept", state.chunks.len());
  }

  /// Drops every chunk. The arena refuses all further allocation work.
  pub fn free_all(&self) {
    let mut state = self.state.enter();

    debug!("arena released, dropping {} chunks", state.chunks.len());

    state.chunks.clear();
    state.free_blocks.clear();
    state.current = 0;
    state.live_bytes = 0;
    state.live_blocks = 0;
    state.released = true;
  }

  pub fn is_released(&self) -> bool {
    self.state.enter().released
  }

  /// Sum of all chunk cursors and free block sizes.
  ///
  /// This is a coarse figure: freed space is counted both in the cursor that
  /// once carved it and in the free list, so it is not "bytes in use". See
  /// [`ArenaStats::live_bytes`] for that.
  pub fn total_allocated(&self) -> usize {
    self.state.enter().stats().total_allocated
  }

  /// Largest single chunk cursor or free block, computed from current state.
  pub fn peak_memory(&self) -> usize {
    self.state.enter().stats().peak_memory
  }

  /// Number of touched chunks plus non-empty free blocks.
  pub fn alloc_count(&self) -> usize {
    self.state.enter().stats().alloc_count
  }

  pub fn stats(&self) -> ArenaStats {
    self.state.enter().stats()
  }

  /// Copy of the free list in its current order.
  pub fn free_blocks(&self) -> Vec<FreeBlock> {
    self.state.enter().free_blocks.clone()
  }

  /// Visits every free block while the arena is held. Calling back into the
  /// arena from `f` panics.
  pub fn for_each_free_block<F>(
    &self,
    mut f: F,
  ) where
    F: FnMut(&FreeBlock),
  {
    let state = self.state.enter();

    for block in state.free_blocks.iter() {
      f(block);
    }
  }
}

impl State {
  fn ensure_usable(&self) -> Result<(), ArenaError> {
    if self.released {
      return Err(ArenaError::Released);
    }

    Ok(())
  }

  /// The only place a caller supplied pointer is turned into a block.
  fn locate(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<Block, ArenaError> {
    let addr = ptr.as_ptr() as usize;

    if addr % ALIGNMENT != 0 {
      warn!("rejected misaligned pointer {:p}", ptr);
      return Err(ArenaError::InvalidPointer);
    }

    for (index, chunk) in self.chunks.iter().enumerate() {
      let Some(offset) = chunk.header_offset_of(addr) else {
        continue;
      };

      let header = unsafe { chunk.read_header(offset) };

      if !header.is_live() || header.size > chunk.offset - offset - HEADER_SIZE {
        warn!("rejected pointer {:p}: bad header {:?}", ptr, header);
        return Err(ArenaError::InvalidPointer);
      }

      return Ok(Block {
        chunk: index,
        offset,
        size: header.size,
      });
    }

    warn!("rejected pointer {:p}: not owned by this arena", ptr);
    Err(ArenaError::InvalidPointer)
  }

  fn write_header(
    &mut self,
    chunk: usize,
    offset: usize,
    header: BlockHeader,
  ) {
    unsafe { self.chunks[chunk].write_header(offset, header) }
  }

  fn payload(
    &self,
    chunk: usize,
    offset: usize,
  ) -> NonNull<u8> {
    self.chunks[chunk].ptr_at(offset + HEADER_SIZE)
  }

  fn alloc_new(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, ArenaError> {
    let size = checked_align(size).ok_or(ArenaError::OutOfMemory { requested: size })?;
    let total_size = size
      .checked_add(HEADER_SIZE)
      .ok_or(ArenaError::OutOfMemory { requested: size })?;

    let (chunk, offset) = match self.take_free(total_size) {
      Some(found) => found,
      None => self.bump(total_size)?,
    };

    self.write_header(chunk, offset, BlockHeader::new(size));
    self.live_bytes += size;
    self.live_blocks += 1;

    let ptr = self.payload(chunk, offset);
    trace!("alloc {} bytes -> {:p} (chunk {}, offset {})", size, ptr, chunk, offset);
    Ok(ptr)
  }

  /// First-fit search. The tail of the chosen block goes back to the free
  /// list only if it can hold a header and 8 more bytes.
  fn take_free(
    &mut self,
    total_size: usize,
  ) -> Option<(usize, usize)> {
    let index = self
      .free_blocks
      .iter()
      .position(|block| block.size >= total_size)?;

    let block = self.free_blocks.remove(index);

    if block.size > total_size + MIN_SPLIT {
      self.free_blocks.push(FreeBlock::new(
        block.chunk,
        block.offset + total_size,
        block.size - total_size,
      ));
      trace!("split free block {:?} at {}", block, total_size);
    }

    Some((block.chunk, block.offset))
  }

  fn bump(
    &mut self,
    total_size: usize,
  ) -> Result<(usize, usize), ArenaError> {
    if let Some(offset) = self.chunks[self.current].bump(total_size) {
      return Ok((self.current, offset));
    }

    let capacity = self
      .config
      .chunk_size_for(total_size)
      .ok_or(ArenaError::OutOfMemory { requested: total_size })?;

    self.chunks.push(Chunk::new(capacity)?);
    self.current = self.chunks.len() - 1;

    debug!("grew arena to {} chunks for a {} byte request", self.chunks.len(), total_size);

    let offset = self.chunks[self.current]
      .bump(total_size)
      .ok_or(ArenaError::OutOfMemory { requested: total_size })?;

    Ok((self.current, offset))
  }

  fn realloc(
    &mut self,
    ptr: NonNull<u8>,
    new_size: usize,
  ) -> Result<NonNull<u8>, ArenaError> {
    let block = self.locate(ptr)?;
    let new_size = checked_align(new_size).ok_or(ArenaError::OutOfMemory { requested: new_size })?;

    if new_size == block.size {
      return Ok(ptr);
    }

    if new_size < block.size {
      return Ok(self.shrink_in_place(block, ptr, new_size));
    }

    if self.try_expand_in_place(block, new_size) {
      trace!("realloc {:p} {} -> {} grew in place", ptr, block.size, new_size);
      return Ok(ptr);
    }

    self.realloc_with_copy(block, ptr, new_size)
  }

  /// Grows a block without moving it, either by pushing the cursor of the
  /// current chunk when the block sits at its bump edge, or by eating into a
  /// free block that starts right where this one ends.
  fn try_expand_in_place(
    &mut self,
    block: Block,
    new_size: usize,
  ) -> bool {
    let grow = new_size - block.size;
    let end = block.end();
    let chunk = &mut self.chunks[block.chunk];

    let expanded = if block.chunk == self.current && end == chunk.offset && grow <= chunk.remaining() {
      chunk.offset += grow;
      true
    } else if let Some(index) = self
      .free_blocks
      .iter()
      .position(|free| free.chunk == block.chunk && free.offset == end && free.size >= grow)
    {
      if self.free_blocks[index].size == grow {
        self.free_blocks.remove(index);
      } else {
        let neighbour = &mut self.free_blocks[index];
        neighbour.offset += grow;
        neighbour.size -= grow;
      }
      true
    } else {
      false
    };

    if expanded {
      self.write_header(block.chunk, block.offset, BlockHeader::new(new_size));
      self.live_bytes += grow;
    }

    expanded
  }

  fn shrink_in_place(
    &mut self,
    block: Block,
    ptr: NonNull<u8>,
    new_size: usize,
  ) -> NonNull<u8> {
    let shrink = block.size - new_size;

    self.write_header(block.chunk, block.offset, BlockHeader::new(new_size));
    self.live_bytes -= shrink;

    if shrink >= MIN_SPLIT {
      self.free_blocks.push(FreeBlock::new(
        block.chunk,
        block.offset + HEADER_SIZE + new_size,
        shrink,
      ));
      self.coalesce(self.free_blocks.len() - 1);
    }

    trace!("realloc {:p} {} -> {} shrunk in place", ptr, block.size, new_size);
    ptr
  }

  fn realloc_with_copy(
    &mut self,
    block: Block,
    ptr: NonNull<u8>,
    new_size: usize,
  ) -> Result<NonNull<u8>, ArenaError> {
    let new_ptr = self.alloc_new(new_size)?;
    let count = block.size.min(new_size);

    unsafe { ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), count) };

    self.release(block);

    trace!("realloc {:p} {} -> {} moved to {:p}", ptr, block.size, new_size, new_ptr);
    Ok(new_ptr)
  }

  fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), ArenaError> {
    let block = self.locate(ptr)?;
    self.release(block);

    trace!("free {:p} ({} bytes)", ptr, block.size);
    Ok(())
  }

  fn release(
    &mut self,
    block: Block,
  ) {
    self.free_blocks.push(FreeBlock::new(
      block.chunk,
      block.offset,
      block.size + HEADER_SIZE,
    ));
    self.coalesce(self.free_blocks.len() - 1);

    // a second free of the same pointer now fails the magic check
    self.write_header(
      block.chunk,
      block.offset,
      BlockHeader {
        size: block.size,
        magic: 0,
      },
    );

    self.live_bytes -= block.size;
    self.live_blocks -= 1;
  }

  /// Merges the free block at `index` with touching neighbours until none
  /// is left. Each merge removes one entry, so this terminates.
  fn coalesce(
    &mut self,
    mut index: usize,
  ) {
    loop {
      let current = self.free_blocks[index];

      let Some(other) =
        (0..self.free_blocks.len()).find(|&i| i != index && current.touches(&self.free_blocks[i]))
      else {
        return;
      };

      let absorbed = self.free_blocks.remove(other);

      if other < index {
        index -= 1;
      }

      let merged = &mut self.free_blocks[index];
      merged.offset = merged.offset.min(absorbed.offset);
      merged.size += absorbed.size;
    }
  }

  fn stats(&self) -> ArenaStats {
    let mut stats = ArenaStats {
      chunks: self.chunks.len(),
      free_blocks: self.free_blocks.len(),
      live_bytes: self.live_bytes,
      live_blocks: self.live_blocks,
      ..ArenaStats::default()
    };

    for block in self.free_blocks.iter() {
      stats.total_allocated += block.size;
      stats.peak_memory = stats.peak_memory.max(block.size);

      if block.size > 0 {
        stats.alloc_count += 1;
      }
    }

    for chunk in self.chunks.iter() {
      stats.capacity += chunk.capacity();
      stats.total_allocated += chunk.offset;
      stats.peak_memory = stats.peak_memory.max(chunk.offset);

      if chunk.offset > 0 {
        stats.alloc_count += 1;
      }
    }

    stats
  }
}
