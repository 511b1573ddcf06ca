//! cow-ordermap: a single-threaded, insertion-ordered map with cheap
//! copy-on-write snapshots and the strong guarantee on every mutation.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build CowOrderMap in safe, verifiable layers so each piece can
//!   be reasoned about independently.
//! - Layers:
//!   - OrderedStore<K, V, S>: structural layer; entries live in a slot
//!     arena threaded with an intrusive doubly-linked order list and
//!     indexed by a hash table, giving O(1) average lookup and O(1)
//!     append/move-to-end/remove with stable generational positions.
//!   - CowOrderMap<K, V, S>: public value-semantic facade; owns the store
//!     behind an `Rc`, decides per mutation whether the store must be
//!     unshared first, and tracks handed-out value references so later
//!     clones copy eagerly.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by design (`Rc`, no atomics).
//! - Touch order: re-inserting a present key moves it to the back and
//!   keeps the value set at its first insertion; only new keys take the
//!   supplied value.
//! - Strong guarantee: a mutation that panics (user `Clone`/`Hash`/`Eq`)
//!   leaves the map byte-for-byte as it was. Every operation orders its
//!   panic-prone work against throwaway state before the first observable
//!   write: unsharing builds a complete deep copy before installing it,
//!   and `merge` replays onto a scratch store committed at the end.
//! - Lookup misses (`at`, `at_mut`, `erase`) fail with the single
//!   `LookupError` kind and never change the map, not even its sharing.
//!
//! Why this split?
//! - Localize invariants: the store owns index/order consistency; the
//!   facade owns sharing, unsharing, and commit ordering. Neither needs
//!   to know the other's rules.
//! - Clear failure boundaries: the store never calls into user code once
//!   its structure is inconsistent; the facade never mutates a store it
//!   does not exclusively own.
//!
//! Hasher and rehashing invariants
//! - Each entry stores a precomputed `u64` hash and indexing always uses
//!   the stored hash; `K: Hash` is never invoked after insertion. This
//!   avoids rehash-time calls into user code.
//!
//! Reentrancy policy
//! - OrderedStore runs user `Eq`/`Hash` only while probing and carries a
//!   debug-only reentrancy guard so nested entry during those sections
//!   panics in debug builds.
//!
//! Notes and non-goals
//! - No thread-safe sharing: maps aliasing one store must stay on one
//!   thread; cross-thread use needs external synchronization or no
//!   aliasing.
//! - No ordering by key value; only insertion/touch order.
//! - No history beyond one level of copy-on-write divergence.
//! - Positions (`ordered_store::Pos`) survive unsharing because deep
//!   clones preserve slot keys; they are invalidated only by removal of
//!   their own entry.
//! - Public API surface is `CowOrderMap`, its `Iter`, and `LookupError`;
//!   `ordered_store` is exposed for reuse but is not part of the map's
//!   contract.

pub mod ordered_store;

mod map;
mod ordered_store_proptest;
mod reentrancy;

// Public surface
pub use map::{CowOrderMap, Iter, LookupError};
