/// Point-in-time view of an arena, see [`crate::Arena::stats`].
///
/// `total_allocated`, `peak_memory` and `alloc_count` are the coarse
/// single-pass figures also returned by the arena methods of the same name.
/// `live_bytes` and `live_blocks` are exact running counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
  pub chunks: usize,
  /// Sum of all chunk capacities.
  pub capacity: usize,
  pub free_blocks: usize,
  /// Sum of chunk cursors plus sum of free block sizes.
  pub total_allocated: usize,
  /// Largest single chunk cursor or free block.
  pub peak_memory: usize,
  /// Touched chunks plus non-empty free blocks.
  pub alloc_count: usize,
  /// Payload bytes of every block currently handed out.
  pub live_bytes: usize,
  pub live_blocks: usize,
}
