use thiserror::Error;

/// Recoverable failures reported by the arena.
///
/// Overlapping calls into one arena are not represented here: they panic,
/// since the arena state can no longer be trusted once that happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArenaError {
  /// The pointer was not handed out by this arena, was already freed, or its
  /// header has been overwritten.
  #[error("invalid pointer or corrupted memory")]
  InvalidPointer,

  #[error("out of memory: failed to obtain {requested} bytes")]
  OutOfMemory { requested: usize },

  /// The arena was torn down with `free_all`.
  #[error("arena has been released")]
  Released,

  #[error("allocation of {requested} bytes would exceed the {limit} byte limit")]
  LimitExceeded { requested: usize, limit: usize },

  #[error("invalid arena configuration: {0}")]
  InvalidConfig(&'static str),
}
