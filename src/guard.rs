use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

/// State that may only be touched by one call at a time.
///
/// Every entry point goes through [`Exclusive::enter`]. A second entry while
/// a guard is alive means the single-caller contract was broken (a nested
/// call from a callback, or a host sharing the user-data pointer across
/// threads) and panics instead of handing out a second `&mut`.
pub(crate) struct Exclusive<T> {
  active_calls: AtomicU32,
  value: UnsafeCell<T>,
}

pub(crate) struct CallGuard<'a, T> {
  owner: &'a Exclusive<T>,
}

impl<T> Exclusive<T> {
  pub fn new(value: T) -> Self {
    Self {
      active_calls: AtomicU32::new(0),
      value: UnsafeCell::new(value),
    }
  }

  pub fn enter(&self) -> CallGuard<'_, T> {
    if self.active_calls.fetch_add(1, Ordering::AcqRel) > 0 {
      self.active_calls.fetch_sub(1, Ordering::AcqRel);
      panic!("arena: concurrent access detected");
    }

    CallGuard { owner: self }
  }

  #[cfg(test)]
  pub fn active_calls(&self) -> u32 {
    self.active_calls.load(Ordering::Acquire)
  }
}

impl<T> Deref for CallGuard<'_, T> {
  type Target = T;

  fn deref(&self) -> &T {
    // only one guard exists at a time
    unsafe { &*self.owner.value.get() }
  }
}

impl<T> DerefMut for CallGuard<'_, T> {
  fn deref_mut(&mut self) -> &mut T {
    unsafe { &mut *self.owner.value.get() }
  }
}

impl<T> Drop for CallGuard<'_, T> {
  fn drop(&mut self) {
    self.owner.active_calls.fetch_sub(1, Ordering::AcqRel);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::panic::{self, AssertUnwindSafe};

  #[test]
  fn test_release_on_drop() {
    let cell = Exclusive::new(1u32);

    {
      let mut guard = cell.enter();
      *guard += 1;
      assert_eq!(cell.active_calls(), 1);
    }

    assert_eq!(cell.active_calls(), 0);
    assert_eq!(*cell.enter(), 2);
  }

  #[test]
  #[should_panic(expected = "concurrent access detected")]
  fn test_nested_entry_panics() {
    let cell = Exclusive::new(());
    let _outer = cell.enter();
    let _inner = cell.enter();
  }

  #[test]
  fn test_release_on_unwind() {
    let cell = Exclusive::new(());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
      let _guard = cell.enter();
      panic!("boom");
    }));

    assert!(result.is_err());
    assert_eq!(cell.active_calls(), 0);
  }
}
