use crate::block::MIN_SPLIT;
use crate::error::ArenaError;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_OVERSIZE_FACTOR: usize = 2;

/// Tunables for an [`crate::Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
  /// Capacity of every regular chunk, rounded up to 8 bytes.
  pub chunk_size: usize,
  /// A request larger than `chunk_size` gets a dedicated chunk of
  /// `oversize_factor` times its total size.
  pub oversize_factor: usize,
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self {
      chunk_size: DEFAULT_CHUNK_SIZE,
      oversize_factor: DEFAULT_OVERSIZE_FACTOR,
    }
  }
}

impl ArenaConfig {
  pub fn chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn oversize_factor(
    mut self,
    oversize_factor: usize,
  ) -> Self {
    self.oversize_factor = oversize_factor;
    self
  }

  /// Returns a copy with the chunk size rounded up, or an error when the
  /// settings cannot produce a working arena.
  pub(crate) fn validated(self) -> Result<Self, ArenaError> {
    let chunk_size = crate::align::checked_align(self.chunk_size)
      .ok_or(ArenaError::InvalidConfig("chunk size overflows"))?;

    if chunk_size < MIN_SPLIT {
      return Err(ArenaError::InvalidConfig("chunk size cannot hold a single block"));
    }

    if self.oversize_factor == 0 {
      return Err(ArenaError::InvalidConfig("oversize factor must be at least 1"));
    }

    Ok(Self { chunk_size, ..self })
  }

  /// Capacity of the chunk appended for a request of `total_size` bytes.
  pub(crate) fn chunk_size_for(
    &self,
    total_size: usize,
  ) -> Option<usize> {
    if total_size > self.chunk_size {
      total_size.checked_mul(self.oversize_factor)
    } else {
      Some(self.chunk_size)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = ArenaConfig::default().validated().unwrap();

    assert_eq!(config.chunk_size, 64 * 1024);
    assert_eq!(config.chunk_size_for(100), Some(64 * 1024));
    assert_eq!(config.chunk_size_for(100_000), Some(200_000));
  }

  #[test]
  fn test_rounds_chunk_size() {
    let config = ArenaConfig::default().chunk_size(1001).validated().unwrap();

    assert_eq!(config.chunk_size, 1008);
  }

  #[test]
  fn test_rejects_bad_settings() {
    assert!(ArenaConfig::default().chunk_size(8).validated().is_err());
    assert!(ArenaConfig::default().oversize_factor(0).validated().is_err());
    assert!(ArenaConfig::default().chunk_size(usize::MAX).validated().is_err());
  }
}
