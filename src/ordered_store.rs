//! OrderedStore: structural layer combining a slot arena, an intrusive
//! order list, and a hash index keyed on precomputed hashes.

use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable position of an entry within an [`OrderedStore`].
///
/// Positions are generational: removing the entry invalidates its position,
/// and a position never aliases a different entry inserted later into the
/// same physical slot. Positions survive a deep [`OrderedStore::clone`],
/// since cloning preserves slot keys.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Pos(DefaultKey);

impl Pos {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Pos(k)
    }
    pub(crate) fn raw(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, K, V, S>(&self, store: &'a OrderedStore<K, V, S>) -> Option<&'a K>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone + Default,
    {
        store.pos_key(*self)
    }

    pub fn value<'a, K, V, S>(&self, store: &'a OrderedStore<K, V, S>) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone + Default,
    {
        store.pos_value(*self)
    }

    pub fn value_mut<'a, K, V, S>(&self, store: &'a mut OrderedStore<K, V, S>) -> Option<&'a mut V>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone + Default,
    {
        store.pos_value_mut(*self)
    }
}

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    // Intrusive order links; None at the list ends.
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

/// Entries in insertion/touch order with O(1) average keyed lookup.
///
/// Storage uses generational slots so positions stay stable while other
/// entries are appended, relocated, or removed. The order is a doubly
/// linked list threaded through the slots, which makes `append`,
/// `move_to_end`, and `remove` O(1) and allocation-free on the order
/// structure itself. The index maps a key's stored hash to its slot, so
/// rehashing never invokes user code.
pub struct OrderedStore<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    reentrancy: DebugReentrancy,
}

impl<K, V> OrderedStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for OrderedStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over entries of an `OrderedStore` in insertion/touch order.
pub struct Iter<'a, K, V, S = RandomState> {
    slots: &'a SlotMap<DefaultKey, Entry<K, V>>,
    cursor: Option<DefaultKey>,
    _pd: core::marker::PhantomData<S>,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (Pos, &'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cursor?;
        let e = &self.slots[k];
        self.cursor = e.next;
        Some((Pos::new(k), &e.key, &e.value))
    }
}

impl<K, V, S> OrderedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            index: HashTable::new(),
            hasher,
            slots: SlotMap::with_key(),
            head: None,
            tail: None,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    // Index probe without taking the reentrancy guard; callers that have
    // already entered a guarded section use this directly.
    fn probe<Q>(&self, hash: u64, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.index.len(), self.slots.len());
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Pos>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.probe(hash, q).map(Pos::new)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.probe(hash, q).is_some()
    }

    /// Whether `pos` is the most recently touched (last) entry.
    pub fn is_last(&self, pos: Pos) -> bool {
        self.tail == Some(pos.raw())
    }

    /// Append a new entry at the end of the order.
    ///
    /// The key must not already be present; lookup-and-touch is the caller's
    /// job. All user code (`Hash`, the debug duplicate probe) runs before
    /// the first structural write, so a panic leaves the store untouched.
    pub fn append(&mut self, key: K, value: V) -> Pos {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        debug_assert!(self.probe(hash, &key).is_none(), "append of a present key");

        let prev = self.tail;
        let k = self.slots.insert(Entry {
            key,
            value,
            hash,
            prev,
            next: None,
        });
        match prev {
            Some(t) => self.slots[t].next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
        // Keyed on the stored hash; the rehash closure never runs user code.
        self.index
            .insert_unique(hash, k, |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0));
        Pos::new(k)
    }

    /// Relocate an existing entry to the end of the order, leaving its key,
    /// value, and position untouched. Returns false for a stale position.
    pub fn move_to_end(&mut self, pos: Pos) -> bool {
        let _g = self.reentrancy.enter();
        let k = pos.raw();
        if !self.slots.contains_key(k) {
            return false;
        }
        if self.tail == Some(k) {
            return true;
        }
        // Unlink. The entry is not the tail, so the list keeps >= 2 entries
        // and the tail stays occupied throughout.
        let (prev, next) = {
            let e = &self.slots[k];
            (e.prev, e.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.slots[n].prev = prev;
        }
        // Relink at the tail.
        let t = self.tail.expect("non-tail entry implies a tail exists");
        self.slots[t].next = Some(k);
        let e = &mut self.slots[k];
        e.prev = Some(t);
        e.next = None;
        self.tail = Some(k);
        true
    }

    /// Remove the entry at `pos`, unlinking it from the order and the index.
    pub fn remove(&mut self, pos: Pos) -> Option<(K, V)> {
        let _g = self.reentrancy.enter();
        let k = pos.raw();
        let entry = self.slots.remove(k)?;

        match entry.prev {
            Some(p) => self.slots[p].next = entry.next,
            None => self.head = entry.next,
        }
        match entry.next {
            Some(n) => self.slots[n].prev = entry.prev,
            None => self.tail = entry.prev,
        }

        match self.index.find_entry(entry.hash, |&kk| kk == k) {
            Ok(occupied) => {
                occupied.remove();
            }
            Err(_) => unreachable!("live slot must have an index entry"),
        }

        Some((entry.key, entry.value))
    }

    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        self.slots.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    pub(crate) fn pos_key(&self, pos: Pos) -> Option<&K> {
        self.slots.get(pos.raw()).map(|e| &e.key)
    }

    pub(crate) fn pos_value(&self, pos: Pos) -> Option<&V> {
        self.slots.get(pos.raw()).map(|e| &e.value)
    }

    pub(crate) fn pos_value_mut(&mut self, pos: Pos) -> Option<&mut V> {
        self.slots.get_mut(pos.raw()).map(|e| &mut e.value)
    }

    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
            _pd: core::marker::PhantomData,
        }
    }
}

impl<K, V, S> Clone for OrderedStore<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    /// Deep copy preserving order, index, and slot keys, so positions taken
    /// from the source resolve identically in the copy. A panicking `K`/`V`
    /// clone drops the half-built copy and leaves the source untouched.
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            index: self.index.clone(),
            slots: self.slots.clone(),
            head: self.head,
            tail: self.tail,
            reentrancy: DebugReentrancy::new(),
        }
    }
}
