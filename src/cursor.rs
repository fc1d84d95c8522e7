//! Cursors and iterators over [`ChainMap`] in chain-then-bucket order.
//!
//! A [`Cursor`] is a detached traversal handle: it names one entry plus the
//! bucket it was found in, and borrows nothing. Capability is chosen at the
//! access site by the borrow handed in (`value` vs `value_mut`), so one
//! traversal algorithm serves both the read-only and mutable views.
//!
//! Cursors are invalidated by any table resize, and are only meaningful
//! against the table that minted them. Each cursor carries its origin
//! table's identity and the generation it was minted under; dereferencing
//! or advancing against a foreign table, or after a resize, panics rather
//! than indexing the wrong arena or observing a rebuilt chain layout.

use core::hash::{BuildHasher, Hash};
use slotmap::{DefaultKey, SecondaryMap};

use crate::chain_map::ChainMap;

/// A position in a [`ChainMap`]: one entry and its bucket index, or the end
/// sentinel.
///
/// The end sentinel is universal: it names no entry, no bucket, and no
/// table, so end cursors compare equal across tables and generations.
/// Equality of non-end cursors compares the origin table, entry, and
/// bucket; the generation is excluded and is used purely to detect
/// staleness.
#[derive(Copy, Clone, Debug)]
pub struct Cursor {
    at: Option<(DefaultKey, usize)>,
    table: u64,
    generation: u64,
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.table == other.table
    }
}

impl Eq for Cursor {}

impl Cursor {
    pub(crate) fn at(slot: DefaultKey, bucket: usize, table: u64, generation: u64) -> Self {
        Self {
            at: Some((slot, bucket)),
            table,
            generation,
        }
    }

    /// The end sentinel.
    pub fn end() -> Self {
        Self {
            at: None,
            table: 0,
            generation: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.at.is_none()
    }

    /// Bucket index of the referenced entry, `None` at the end sentinel.
    pub fn bucket(&self) -> Option<usize> {
        self.at.map(|(_, bucket)| bucket)
    }

    fn position<K, V, S>(&self, map: &ChainMap<K, V, S>) -> Option<(DefaultKey, usize)>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let pos = self.at?;
        assert_eq!(
            self.table, map.table_id,
            "cursor applied to a table other than its origin"
        );
        assert_eq!(
            self.generation, map.generation,
            "cursor invalidated by table resize; re-derive it via find/begin"
        );
        Some(pos)
    }

    /// Borrow the entry's key. `None` at the end sentinel.
    ///
    /// # Panics
    /// Panics if `map` is not the table this cursor came from, or if that
    /// table has resized since the cursor was obtained.
    pub fn key<'a, K, V, S>(&self, map: &'a ChainMap<K, V, S>) -> Option<&'a K>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        self.position(map).map(|(k, _)| &map.entry(k).key)
    }

    /// Borrow the entry's value. `None` at the end sentinel.
    ///
    /// # Panics
    /// Panics if `map` is not the table this cursor came from, or if that
    /// table has resized since the cursor was obtained.
    pub fn value<'a, K, V, S>(&self, map: &'a ChainMap<K, V, S>) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        self.position(map).map(|(k, _)| &map.entry(k).value)
    }

    /// Mutably borrow the entry's value. `None` at the end sentinel.
    ///
    /// # Panics
    /// Panics if `map` is not the table this cursor came from, or if that
    /// table has resized since the cursor was obtained.
    pub fn value_mut<'a, K, V, S>(&self, map: &'a mut ChainMap<K, V, S>) -> Option<&'a mut V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let (k, _) = self.position(map)?;
        Some(&mut map.entry_mut(k).value)
    }

    /// Step to the next entry: the chain successor if one exists, otherwise
    /// the head of the next non-empty bucket, otherwise the end sentinel.
    ///
    /// # Panics
    /// Panics if called on the end sentinel, against a foreign table, or
    /// on a cursor invalidated by a resize.
    pub fn advance<K, V, S>(&mut self, map: &ChainMap<K, V, S>)
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let pos = self
            .position(map)
            .expect("cannot advance the end sentinel");
        *self = match map.next_position(pos) {
            Some((k, bucket)) => Cursor::at(k, bucket, map.table_id, map.generation),
            None => Cursor::end(),
        };
    }
}

/// Read-only iterator over a [`ChainMap`] in chain-then-bucket order.
pub struct Iter<'a, K, V, S = crate::DefaultHashBuilder> {
    map: &'a ChainMap<K, V, S>,
    at: Option<(DefaultKey, usize)>,
}

impl<'a, K, V, S> Iter<'a, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn new(map: &'a ChainMap<K, V, S>) -> Self {
        let at = map.first_position();
        Self { map, at }
    }
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.at?;
        self.at = self.map.next_position(pos);
        let entry = self.map.entry(pos.0);
        Some((&entry.key, &entry.value))
    }
}

/// Mutable iterator over a [`ChainMap`]; same traversal order as [`Iter`].
///
/// The traversal order is snapshotted at construction and the entry borrows
/// are split out of the arena up front, one disjoint `&mut` per entry, so
/// yielded items are independent of each other and of the iterator. Safe by
/// construction; no entry is handed out twice.
pub struct IterMut<'a, K, V> {
    order: std::vec::IntoIter<DefaultKey>,
    entries: SecondaryMap<DefaultKey, (&'a K, &'a mut V)>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new<S>(map: &'a mut ChainMap<K, V, S>) -> Self
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let mut order = Vec::with_capacity(map.len());
        let mut pos = map.first_position();
        while let Some(p) = pos {
            pos = map.next_position(p);
            order.push(p.0);
        }

        let mut entries = SecondaryMap::with_capacity(order.len());
        for (k, entry) in map.slots.iter_mut() {
            entries.insert(k, (&entry.key, &mut entry.value));
        }

        Self {
            order: order.into_iter(),
            entries,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.order.next()?;
        self.entries.remove(k)
    }
}
