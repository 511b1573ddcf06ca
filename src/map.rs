//! CowOrderMap: value-semantic facade with copy-on-write sharing and the
//! strong guarantee on every mutation.

use crate::ordered_store::{Iter as StoreIter, OrderedStore};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// Error returned by [`CowOrderMap::at`], [`CowOrderMap::at_mut`], and
/// [`CowOrderMap::erase`] when the key is absent.
///
/// Implements [`std::error::Error`], so callers can match it specifically
/// or box it away generically. A miss never changes the map in any way,
/// including its sharing state.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LookupError;

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl std::error::Error for LookupError {}

/// An insertion-ordered map with cheap copy-on-write snapshots.
///
/// Iteration follows touch order: an entry sits where it was most recently
/// inserted, and re-inserting a present key moves it to the back *without*
/// changing its value (only the first insertion sets the value). `clone` is
/// O(1): copies alias one backing store until a mutation on either side
/// forces the mutating side to take its own deep copy first.
///
/// Every mutating operation gives the strong guarantee: all panic-prone
/// work (user `Clone`/`Hash`/`Eq`) happens against throwaway state before
/// the first observable write, so a panic mid-operation leaves the map
/// exactly as it was.
///
/// Single-threaded by design; the backing store is `Rc`-owned, so the map
/// is `!Send`/`!Sync`.
pub struct CowOrderMap<K, V, S = RandomState> {
    store: Rc<OrderedStore<K, V, S>>,
    // Set when a direct `&mut V` has been handed out (`at_mut`/`or_default`)
    // and not yet invalidated by a tracked mutation. A clone taken while
    // this is set copies the store eagerly instead of aliasing it.
    escaped_mut_ref: bool,
}

impl<K, V> CowOrderMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for CowOrderMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            store: Rc::new(OrderedStore::with_hasher(hasher)),
            escaped_mut_ref: false,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.store.contains_key(q)
    }

    /// Whether this map currently aliases its store with other maps.
    ///
    /// Purely introspective; exposed so callers (and tests) can observe
    /// when copy-on-write has unshared a snapshot.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.store) > 1
    }

    /// Borrow the value for `q`, or `None` if absent. Never clones.
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.store.find(q)?;
        pos.value(&self.store)
    }

    /// Borrow the value for `q`, failing with [`LookupError`] if absent.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(LookupError)
    }

    /// Drop all entries. In-place when the store is exclusively owned;
    /// otherwise the shared store is left to the other aliases and replaced
    /// with a fresh empty one (no content is cloned either way).
    pub fn clear(&mut self) {
        if Rc::strong_count(&self.store) == 1 {
            Rc::get_mut(&mut self.store)
                .expect("strong count 1 and no weak refs exist")
                .clear();
        } else {
            let hasher = self.store.hasher().clone();
            self.store = Rc::new(OrderedStore::with_hasher(hasher));
        }
        self.escaped_mut_ref = false;
    }

    /// Iterate entries in touch order.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            inner: self.store.iter(),
        }
    }
}

impl<K, V, S> CowOrderMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    // Ensure exclusive store ownership. When shared, the deep clone is
    // fully built before it is installed; a panicking K/V clone therefore
    // leaves `self` on its old, untouched handle.
    fn unshare(&mut self) {
        if Rc::strong_count(&self.store) > 1 {
            self.store = Rc::new(OrderedStore::clone(&self.store));
        }
    }

    fn store_mut(&mut self) -> &mut OrderedStore<K, V, S> {
        self.unshare();
        Rc::get_mut(&mut self.store).expect("store is exclusive after unshare")
    }

    /// Insert `value` under `key`, or touch an existing `key`.
    ///
    /// Returns `true` and appends `(key, value)` when the key is new.
    /// When the key is present it moves to the back, keeps the value set at
    /// its first insertion, and `value` is discarded; returns `false`. If
    /// the key is already the most recently touched entry this is a no-op
    /// fast path that performs no copy-on-write at all.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        match self.store.find(&key) {
            Some(pos) if self.store.is_last(pos) => false,
            Some(pos) => {
                // Positions survive the deep clone, so `pos` resolves in
                // the unshared store as well.
                let moved = self.store_mut().move_to_end(pos);
                debug_assert!(moved, "position survives unsharing");
                self.escaped_mut_ref = false;
                false
            }
            None => {
                self.store_mut().append(key, value);
                self.escaped_mut_ref = false;
                true
            }
        }
    }

    /// Remove the entry for `q`, failing with [`LookupError`] (and leaving
    /// the map untouched, without unsharing) if the key is absent.
    pub fn erase<Q>(&mut self, q: &Q) -> Result<(), LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.store.find(q).ok_or(LookupError)?;
        self.store_mut()
            .remove(pos)
            .expect("position survives unsharing");
        self.escaped_mut_ref = false;
        Ok(())
    }

    /// Mutably borrow the value for `q`, failing with [`LookupError`] if
    /// absent (a miss never unshares). On a hit the store is unshared first
    /// and the map is marked as having handed out a value reference, so the
    /// next [`clone`](Self::clone) copies eagerly.
    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.store.find(q).ok_or(LookupError)?;
        self.unshare();
        self.escaped_mut_ref = true;
        let store = Rc::get_mut(&mut self.store).expect("store is exclusive after unshare");
        Ok(pos.value_mut(store).expect("position survives unsharing"))
    }

    /// Mutably borrow the value for `key`, appending a default-constructed
    /// value first if the key is absent. An existing key keeps its position
    /// (this is a lookup, not a touch). Marks the map as having handed out
    /// a value reference, like [`at_mut`](Self::at_mut).
    pub fn or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let found = self.store.find(&key);
        self.unshare();
        self.escaped_mut_ref = true;
        let store = Rc::get_mut(&mut self.store).expect("store is exclusive after unshare");
        let pos = found.unwrap_or_else(|| store.append(key, V::default()));
        pos.value_mut(store).expect("position survives unsharing")
    }

    /// Replay `other` into `self` in `other`'s iteration order, entry by
    /// entry, with [`insert`](Self::insert) semantics: keys already in
    /// `self` keep their original value but move to the position dictated
    /// by `other`'s order; keys only in `other` are appended with `other`'s
    /// value. `other` is never modified.
    ///
    /// The replay runs on a scratch copy that is committed only once every
    /// entry went in, so a panic (from a `K`/`V` clone) leaves `self`
    /// exactly as it was.
    pub fn merge(&mut self, other: &Self) {
        let mut scratch = OrderedStore::clone(&self.store);
        for (_p, k, v) in other.store.iter() {
            match scratch.find(k) {
                Some(pos) => {
                    // Present: touch only, keep the existing value.
                    scratch.move_to_end(pos);
                }
                None => {
                    scratch.append(k.clone(), v.clone());
                }
            }
        }
        self.store = Rc::new(scratch);
        self.escaped_mut_ref = false;
    }
}

impl<K, V, S> Clone for CowOrderMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    /// O(1) alias of the backing store. If the source has handed out a
    /// direct value reference (`at_mut`/`or_default`) since its last
    /// tracked mutation, the copy deep-clones immediately instead, so later
    /// writes through that reference cannot reach it.
    fn clone(&self) -> Self {
        let store = if self.escaped_mut_ref {
            Rc::new(OrderedStore::clone(&self.store))
        } else {
            Rc::clone(&self.store)
        };
        Self {
            store,
            escaped_mut_ref: false,
        }
    }
}

impl<K, V, S> fmt::Debug for CowOrderMap<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher + Clone + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Deep semantic equality: same length, same order, same `(key, value)`
/// pairs. Maps aliasing one store compare equal without iterating.
impl<K, V, S> PartialEq for CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher + Clone + Default,
{
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.store, &other.store) {
            return true;
        }
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

impl<K, V, S> Eq for CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher + Clone + Default,
{
}

impl<K, V, S> Extend<(K, V)> for CowOrderMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for CowOrderMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(Default::default());
        map.extend(iter);
        map
    }
}

impl<K, Q, V, S> core::ops::Index<&Q> for CowOrderMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher + Clone + Default,
{
    type Output = V;

    /// Read-only indexing; panics if the key is absent. The inserting
    /// variant lives in [`CowOrderMap::or_default`].
    fn index(&self, q: &Q) -> &V {
        self.get(q).expect("key not found")
    }
}

/// Iterator over a map's entries in touch order.
pub struct Iter<'a, K, V, S = RandomState> {
    inner: StoreIter<'a, K, V, S>,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_p, k, v)| (k, v))
    }
}

impl<'a, K, V, S> IntoIterator for &'a CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
