//! Debug-only reentrancy guard.
//!
//! The store calls user `Hash`/`Eq` while probing; if that user code calls
//! back into the same store mid-operation it would observe (or corrupt)
//! transiently inconsistent index/order state. In debug builds the guard
//! panics on such nested entry; in release builds it compiles to nothing.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-store entry flag. Guard public entry points with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    entered: Cell<bool>,
    // Keep !Send + !Sync in line with single-threaded design.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            entered: Cell::new(false),
            _nosend: PhantomData,
        }
    }

    /// Enter a guarded section; panics in debug builds if already entered.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.entered.replace(true),
                "reentrancy detected: nested entry into the store"
            );
        }
        ReentrancyGuard {
            #[cfg(debug_assertions)]
            owner: self,
            #[cfg(not(debug_assertions))]
            _marker: PhantomData,
        }
    }
}

/// RAII guard returned by [`DebugReentrancy::enter`].
pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _marker: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.entered.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::DebugReentrancy;

    #[test]
    fn sequential_entry_is_ok() {
        let r = DebugReentrancy::new();
        drop(r.enter());
        drop(r.enter());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_entry_panics_in_debug() {
        let r = DebugReentrancy::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g1 = r.enter();
            let _g2 = r.enter();
        }));
        assert!(res.is_err(), "expected nested entry to panic in debug builds");
    }
}
