//! C entry point for hosts that take a realloc-style allocation hook.
//!
//! ```text
//!   host runtime                         arena
//!   ┌───────────────────────┐           ┌──────────────────────────┐
//!   │ alloc(ud, ptr, o, n)  │ ────────▶ │ arena_realloc            │
//!   │                       │           │   n == 0     -> free     │
//!   │ ud = as_user_data()   │ ◀──────── │   ptr == NULL -> alloc   │
//!   └───────────────────────┘  ptr|NULL │   otherwise  -> realloc  │
//!                                       └──────────────────────────┘
//! ```

use std::ptr::{self, NonNull};

use libc::{c_void, size_t};
use log::{debug, warn};

use crate::arena::Arena;

/// Shape of the allocation hook expected by embedding hosts.
pub type AllocFn = unsafe extern "C" fn(
  ud: *mut c_void,
  ptr: *mut c_void,
  osize: size_t,
  nsize: size_t,
) -> *mut c_void;

impl Arena {
  /// Opaque pointer to hand to the host next to [`arena_realloc`].
  ///
  /// The arena must outlive every call the host makes with it.
  pub fn as_user_data(&self) -> *mut c_void {
    self as *const Arena as *mut c_void
  }

  /// Applies the hook semantics to this arena: errors become `NULL`.
  pub(crate) fn realloc_raw(
    &self,
    ptr: *mut c_void,
    osize: usize,
    nsize: usize,
  ) -> *mut c_void {
    let ptr = NonNull::new(ptr as *mut u8);

    if nsize == 0 {
      if let Some(ptr) = ptr {
        if let Err(err) = self.free(ptr) {
          warn!("host free of {:p} failed: {}", ptr, err);
        }
      }
      return ptr::null_mut();
    }

    if let Some(ptr) = ptr {
      if let Ok(size) = self.size(ptr) {
        if crate::align::checked_align(osize) != Some(size) {
          debug!("host reports {} bytes for {:p}, header says {}", osize, ptr, size);
        }
      }
    }

    match self.realloc(ptr, nsize) {
      Ok(Some(new_ptr)) => new_ptr.as_ptr() as *mut c_void,
      Ok(None) => ptr::null_mut(),
      Err(err) => {
        warn!("host realloc to {} bytes failed: {}", nsize, err);
        ptr::null_mut()
      }
    }
  }
}

/// [`AllocFn`] backed by an [`Arena`].
///
/// # Safety
///
/// `ud` must come from [`Arena::as_user_data`] on an arena that is still
/// alive, and `ptr` must be `NULL` or a pointer the host got from this hook.
pub unsafe extern "C" fn arena_realloc(
  ud: *mut c_void,
  ptr: *mut c_void,
  osize: size_t,
  nsize: size_t,
) -> *mut c_void {
  let Some(arena) = (unsafe { (ud as *const Arena).as_ref() }) else {
    warn!("arena_realloc called without an arena");
    return ptr::null_mut();
  };

  arena.realloc_raw(ptr, osize, nsize)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ArenaConfig;

  const HOOK: AllocFn = arena_realloc;

  #[test]
  fn test_hook_lifecycle() {
    let arena = Arena::with_config(ArenaConfig::default().chunk_size(4096)).unwrap();
    let ud = arena.as_user_data();

    unsafe {
      let block = HOOK(ud, ptr::null_mut(), 0, 24);
      assert!(!block.is_null());
      ptr::write_bytes(block as *mut u8, 0x5A, 24);

      let grown = HOOK(ud, block, 24, 200);
      assert!(!grown.is_null());
      assert_eq!(*(grown as *const u8).add(23), 0x5A);

      assert!(HOOK(ud, grown, 200, 0).is_null());
      assert_eq!(arena.stats().live_blocks, 0);
    }
  }

  #[test]
  fn test_hook_maps_errors_to_null() {
    let arena = Arena::new().unwrap();
    let ud = arena.as_user_data();
    let mut foreign = [0u64; 4];
    let foreign = foreign.as_mut_ptr().wrapping_add(2) as *mut c_void;

    unsafe {
      assert!(HOOK(ud, foreign, 8, 64).is_null());
      assert!(HOOK(ud, foreign, 8, 0).is_null());
      assert!(HOOK(ud, ptr::null_mut(), 0, 0).is_null());
      assert!(HOOK(ptr::null_mut(), ptr::null_mut(), 0, 8).is_null());
    }
  }

  #[test]
  fn test_hook_trusts_header_over_osize() {
    let arena = Arena::new().unwrap();
    let ud = arena.as_user_data();

    unsafe {
      let block = HOOK(ud, ptr::null_mut(), 0, 64);
      let same = HOOK(ud, block, 4096, 64);

      assert_eq!(block, same);
      assert_eq!(arena.size(NonNull::new(same as *mut u8).unwrap()).unwrap(), 64);
    }
  }
}
