use std::ptr::{self, NonNull};

use libc::{c_void, size_t};
use log::warn;

use crate::align::checked_align;
use crate::arena::Arena;
use crate::error::ArenaError;

/// An [`Arena`] that refuses to hold more than `limit` live payload bytes.
///
/// Frees and shrinks always go through; an allocation or growth that would
/// cross the limit fails with [`ArenaError::LimitExceeded`] and leaves the
/// original block untouched.
pub struct LimitedArena {
  arena: Arena,
  limit: usize,
}

impl LimitedArena {
  pub fn new(
    arena: Arena,
    limit: usize,
  ) -> Self {
    Self { arena, limit }
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  pub fn arena(&self) -> &Arena {
    &self.arena
  }

  pub fn into_inner(self) -> Arena {
    self.arena
  }

  pub fn realloc(
    &self,
    ptr: Option<NonNull<u8>>,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>, ArenaError> {
    if new_size == 0 {
      return self.arena.realloc(ptr, 0);
    }

    let old_size = match ptr {
      Some(ptr) => self.arena.size(ptr)?,
      None => 0,
    };
    let new_size_aligned = checked_align(new_size).ok_or(ArenaError::OutOfMemory { requested: new_size })?;

    if new_size_aligned > old_size {
      let used = self.arena.stats().live_bytes - old_size;

      if used.saturating_add(new_size_aligned) > self.limit {
        return Err(ArenaError::LimitExceeded {
          requested: new_size,
          limit: self.limit,
        });
      }
    }

    self.arena.realloc(ptr, new_size)
  }

  pub fn free(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<(), ArenaError> {
    self.arena.free(ptr)
  }

  pub fn as_user_data(&self) -> *mut c_void {
    self as *const LimitedArena as *mut c_void
  }
}

/// [`crate::AllocFn`] backed by a [`LimitedArena`]. Returns `NULL` once the
/// limit would be crossed, which hosts usually surface as an out of memory
/// error.
///
/// # Safety
///
/// `ud` must come from [`LimitedArena::as_user_data`] on a value that is
/// still alive, and `ptr` must be `NULL` or a pointer obtained from this hook.
pub unsafe extern "C" fn limited_realloc(
  ud: *mut c_void,
  ptr: *mut c_void,
  osize: size_t,
  nsize: size_t,
) -> *mut c_void {
  let Some(limited) = (unsafe { (ud as *const LimitedArena).as_ref() }) else {
    warn!("limited_realloc called without an arena");
    return ptr::null_mut();
  };

  if nsize == 0 {
    return limited.arena.realloc_raw(ptr, osize, 0);
  }

  match limited.realloc(NonNull::new(ptr as *mut u8), nsize) {
    Ok(Some(new_ptr)) => new_ptr.as_ptr() as *mut c_void,
    Ok(None) => ptr::null_mut(),
    Err(err) => {
      warn!("limited realloc to {} bytes failed: {}", nsize, err);
      ptr::null_mut()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_refuses_past_limit() {
    let limited = LimitedArena::new(Arena::new().unwrap(), 256);

    let first = limited.realloc(None, 200).unwrap().unwrap();

    assert_eq!(
      limited.realloc(None, 64),
      Err(ArenaError::LimitExceeded {
        requested: 64,
        limit: 256
      })
    );
    assert_eq!(limited.realloc(Some(first), 300).unwrap_err(), ArenaError::LimitExceeded {
      requested: 300,
      limit: 256
    });
    assert_eq!(limited.arena().size(first).unwrap(), 200);

    limited.realloc(None, 56).unwrap();

    let arena = limited.into_inner();
    assert_eq!(arena.stats().live_bytes, 256);
    assert_eq!(arena.size(first).unwrap(), 200);
  }

  #[test]
  fn test_shrink_and_free_always_pass() {
    let limited = LimitedArena::new(Arena::new().unwrap(), 128);

    let block = limited.realloc(None, 128).unwrap().unwrap();
    let shrunk = limited.realloc(Some(block), 32).unwrap().unwrap();
    assert_eq!(shrunk, block);

    let grown = limited.realloc(Some(shrunk), 128).unwrap().unwrap();
    limited.free(grown).unwrap();

    assert_eq!(limited.arena().stats().live_bytes, 0);
  }

  #[test]
  fn test_hook_returns_null_at_limit() {
    let limited = LimitedArena::new(Arena::new().unwrap(), 64);
    let ud = limited.as_user_data();

    unsafe {
      let block = limited_realloc(ud, ptr::null_mut(), 0, 64);
      assert!(!block.is_null());
      assert!(limited_realloc(ud, ptr::null_mut(), 0, 8).is_null());
      assert!(limited_realloc(ud, block, 64, 0).is_null());
      assert!(!limited_realloc(ud, ptr::null_mut(), 0, 8).is_null());
    }
  }
}
