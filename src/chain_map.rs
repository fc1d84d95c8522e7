//! ChainMap: separately-chained hash table over a slot-arena of entries.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicU64, Ordering};
use slotmap::{DefaultKey, SlotMap};

use crate::cursor::{Cursor, Iter, IterMut};

/// Process-wide counter minting table identities. Identity 0 is reserved
/// for the end sentinel, which belongs to no table.
static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Default number of buckets for a freshly constructed table.
pub const DEFAULT_CAPACITY: usize = 23;

/// Ratio of entries to buckets above which the table grows. Kept low because
/// tables are tuned for lookup speed, not memory footprint.
const LOAD_FACTOR_THRESHOLD: f64 = 0.4;

/// Multiple of the entry count used for the post-growth bucket count.
const GROWTH_MULTIPLE: usize = 3;

/// Additive increment on growth; pure multiplication underperforms for small
/// tables, so this accelerates early growth.
const GROWTH_INCREMENT: usize = 5;

/// One key-value entry in a bucket's collision chain. The successor is an
/// arena key, never an owning pointer, so a chain cannot own a cycle.
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Hash precomputed at insertion; rehashing never re-invokes `K: Hash`.
    hash: u64,
    pub(crate) next: Option<DefaultKey>,
}

/// Collision and growth counters, compiled in with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    /// Number of inserts that landed behind an existing chain entry.
    pub collisions: u64,
    /// Number of bucket-vector rebuilds.
    pub resizes: u64,
}

/// A hash map resolving collisions by separate chaining.
///
/// Buckets hold chain heads; entries live in a generational arena and link
/// to their chain successor by arena key. New keys are appended at the
/// chain tail. Whenever an insert pushes the load factor above 0.4, the
/// table rehashes all-at-once to `len * 3 + 5` buckets before the insert
/// returns, so the post-insert load factor is always at or below the
/// threshold.
///
/// Every resize invalidates previously obtained [`Cursor`]s; the table
/// tracks a generation counter and stale cursors fail fast on dereference.
/// There is no removal API and no insertion-order guarantee.
///
/// Single-threaded by design: no locking; the only atomic in the crate is
/// the process-wide counter that mints table identities.
pub struct ChainMap<K, V, S = crate::DefaultHashBuilder> {
    hasher: S,
    /// Chain heads, one per hash slot. Length is the current capacity, ≥ 1.
    buckets: Vec<Option<DefaultKey>>,
    pub(crate) slots: SlotMap<DefaultKey, Entry<K, V>>,
    /// Distinct per table, so a cursor can tell its origin table apart
    /// from any other.
    pub(crate) table_id: u64,
    pub(crate) generation: u64,
    #[cfg(feature = "stats")]
    stats: Stats,
}

impl<K, V> ChainMap<K, V>
where
    K: Eq + Hash,
{
    /// Create a table with [`DEFAULT_CAPACITY`] buckets.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a table with `capacity` buckets (clamped to at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V> Default for ChainMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ChainMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            buckets: vec![None; capacity.max(1)],
            slots: SlotMap::with_key(),
            table_id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            #[cfg(feature = "stats")]
            stats: Stats::default(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current bucket count. Grows automatically; never shrinks.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Collision/resize counters accumulated so far.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Mint a cursor bound to this table at its current generation.
    fn cursor_to(&self, slot: DefaultKey, bucket: usize) -> Cursor {
        Cursor::at(slot, bucket, self.table_id, self.generation)
    }

    /// Insert `key` → `value`.
    ///
    /// If the key is already present its value is overwritten in place and
    /// the second element of the return is `true`; otherwise a new entry is
    /// appended at the tail of its bucket's chain and the second element is
    /// `false`. Either way the cursor addresses the entry holding `value`,
    /// positioned after any growth triggered by this insert.
    pub fn insert(&mut self, key: K, value: V) -> (Cursor, bool) {
        let hash = self.make_hash(&key);
        let bucket = self.bucket_of(hash);

        // Walk the chain, tracking the predecessor so a miss can append at
        // the tail.
        let mut prev: Option<DefaultKey> = None;
        let mut curr = self.buckets[bucket];
        while let Some(k) = curr {
            if self.slots[k].key == key {
                self.slots[k].value = value;
                return (self.cursor_to(k, bucket), true);
            }
            debug_assert_ne!(self.slots[k].next, Some(k), "self-referential chain link");
            prev = Some(k);
            curr = self.slots[k].next;
        }

        let new = self.slots.insert(Entry {
            key,
            value,
            hash,
            next: None,
        });
        match prev {
            None => self.buckets[bucket] = Some(new),
            Some(tail) => {
                self.slots[tail].next = Some(new);
                #[cfg(feature = "stats")]
                {
                    self.stats.collisions += 1;
                }
            }
        }

        // Grow once the load factor crosses the threshold, before returning,
        // so the post-insert load factor is always within bounds.
        if self.slots.len() as f64 / self.buckets.len() as f64 > LOAD_FACTOR_THRESHOLD {
            self.resize(self.slots.len() * GROWTH_MULTIPLE + GROWTH_INCREMENT);
        }
        (self.cursor_to(new, self.bucket_of(hash)), false)
    }

    /// Shared chain walk behind `find`/`get`/`get_mut`.
    fn lookup<Q>(&self, q: &Q) -> Option<(DefaultKey, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let bucket = self.bucket_of(self.make_hash(q));
        let mut curr = self.buckets[bucket];
        while let Some(k) = curr {
            let entry = &self.slots[k];
            if entry.key.borrow() == q {
                return Some((k, bucket));
            }
            debug_assert_ne!(entry.next, Some(k), "self-referential chain link");
            curr = entry.next;
        }
        None
    }

    /// Cursor to the entry for `q`, or the end sentinel if absent.
    pub fn find<Q>(&self, q: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.lookup(q) {
            Some((k, bucket)) => self.cursor_to(k, bucket),
            None => Cursor::end(),
        }
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).is_some()
    }

    /// Borrow the value for `q`.
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (k, _) = self.lookup(q)?;
        Some(&self.slots[k].value)
    }

    /// Mutably borrow the value for `q`. Same traversal as [`Self::get`].
    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (k, _) = self.lookup(q)?;
        Some(&mut self.slots[k].value)
    }

    /// Cursor to the first entry in chain-then-bucket order, or the end
    /// sentinel if the table is empty.
    pub fn begin(&self) -> Cursor {
        match self.first_position() {
            Some((k, bucket)) => self.cursor_to(k, bucket),
            None => Cursor::end(),
        }
    }

    /// The universal end sentinel; equal across all tables.
    pub fn end(&self) -> Cursor {
        Cursor::end()
    }

    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter::new(self)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(self)
    }

    /// Rebuild the bucket vector at `new_size` slots, relinking every entry
    /// by its stored hash. All-or-nothing: the arena is untouched, only the
    /// links move. Invalidates all outstanding cursors.
    fn resize(&mut self, new_size: usize) {
        let new_size = new_size.max(1);
        if new_size == self.buckets.len() {
            return;
        }

        // Collect every reachable entry before clearing the buckets. The
        // arena keeps the entries alive; only the links are rebuilt.
        let mut reachable = Vec::with_capacity(self.slots.len());
        for head in &self.buckets {
            let mut curr = *head;
            while let Some(k) = curr {
                reachable.push(k);
                debug_assert_ne!(self.slots[k].next, Some(k), "self-referential chain link");
                curr = self.slots[k].next;
            }
        }
        debug_assert_eq!(reachable.len(), self.slots.len(), "unreachable entries");

        self.buckets.clear();
        self.buckets.resize(new_size, None);
        self.generation += 1;
        #[cfg(feature = "stats")]
        {
            self.stats.resizes += 1;
        }

        // Relink directly rather than through `insert`, which would
        // reallocate the entries and double-count them.
        for k in reachable {
            // Clear the stale successor before relinking so no link ever
            // describes the old chain layout.
            self.slots[k].next = None;
            let bucket = self.bucket_of(self.slots[k].hash);
            match self.buckets[bucket] {
                None => self.buckets[bucket] = Some(k),
                Some(head) => {
                    let mut tail = head;
                    while let Some(next) = self.slots[tail].next {
                        debug_assert_ne!(next, tail, "self-referential chain link");
                        tail = next;
                    }
                    debug_assert_ne!(tail, k, "entry relinked to itself");
                    self.slots[tail].next = Some(k);
                    #[cfg(feature = "stats")]
                    {
                        self.stats.collisions += 1;
                    }
                }
            }
        }
    }

    // --- traversal primitives shared by Cursor::advance and the iterators ---

    pub(crate) fn first_position(&self) -> Option<(DefaultKey, usize)> {
        if self.is_empty() {
            return None;
        }
        self.buckets
            .iter()
            .enumerate()
            .find_map(|(i, head)| head.map(|k| (k, i)))
    }

    /// Successor within the chain, else the head of the next non-empty
    /// bucket, else `None`.
    pub(crate) fn next_position(&self, (k, bucket): (DefaultKey, usize)) -> Option<(DefaultKey, usize)> {
        if let Some(next) = self.slots[k].next {
            return Some((next, bucket));
        }
        for i in bucket + 1..self.buckets.len() {
            if let Some(head) = self.buckets[i] {
                return Some((head, i));
            }
        }
        None
    }

    pub(crate) fn entry(&self, k: DefaultKey) -> &Entry<K, V> {
        &self.slots[k]
    }

    pub(crate) fn entry_mut(&mut self, k: DefaultKey) -> &mut Entry<K, V> {
        &mut self.slots[k]
    }
}

impl<'a, K, V, S> IntoIterator for &'a ChainMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;
    use std::collections::BTreeMap;

    /// BuildHasher forcing every key into one bucket, to exercise chains.
    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    /// Invariant: values inserted under distinct keys round-trip through
    /// both `get` and cursor dereference.
    #[test]
    fn insert_then_find_round_trips() {
        let mut m: ChainMap<String, i32> = ChainMap::new();
        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        m.insert("c".to_string(), 3);

        assert_eq!(m.len(), 3);
        assert_eq!(m.capacity(), DEFAULT_CAPACITY);
        assert_eq!(m.get("b"), Some(&2));

        let c = m.find("b");
        assert!(!c.is_end());
        assert_eq!(c.key(&m), Some(&"b".to_string()));
        assert_eq!(c.value(&m), Some(&2));
    }

    /// Invariant: inserting a present key overwrites in place, reports an
    /// update, and leaves `len` unchanged.
    #[test]
    fn insert_existing_key_updates_in_place() {
        let mut m: ChainMap<&str, i32> = ChainMap::new();
        let (c1, updated) = m.insert("k", 1);
        assert!(!updated);
        let (c2, updated) = m.insert("k", 2);
        assert!(updated);
        assert_eq!(c1, c2, "update addresses the original entry");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("k"), Some(&2));
    }

    /// Invariant: a missing key yields the end sentinel from `find` and
    /// `None` from `get`.
    #[test]
    fn find_absent_is_end() {
        let mut m: ChainMap<String, i32> = ChainMap::new();
        m.insert("present".to_string(), 7);
        assert!(m.find("absent").is_end());
        assert_eq!(m.find("absent"), m.end());
        assert_eq!(m.get("absent"), None);
        assert!(!m.contains_key("absent"));
    }

    /// Invariant: `is_empty()` and `begin() == end()` hold exactly when
    /// `len() == 0`.
    #[test]
    fn empty_table_begin_equals_end() {
        let mut m: ChainMap<String, i32> = ChainMap::new();
        assert!(m.is_empty());
        assert_eq!(m.begin(), m.end());

        m.insert("x".to_string(), 0);
        assert!(!m.is_empty());
        assert_ne!(m.begin(), m.end());
    }

    /// Invariant: the load factor crosses 0.4 at the 10th distinct key in a
    /// capacity-23 table, growing it to 10*3+5 = 35 buckets; every earlier
    /// key survives the rehash.
    #[test]
    fn growth_at_threshold_preserves_entries() {
        let mut m: ChainMap<String, usize> = ChainMap::with_capacity(23);
        for i in 0..9 {
            m.insert(format!("key{i}"), i);
        }
        assert_eq!(m.capacity(), 23, "9/23 is below the threshold");

        m.insert("key9".to_string(), 9);
        assert_eq!(m.capacity(), 35, "10/23 crosses the threshold");

        for i in 0..10 {
            assert_eq!(m.get(format!("key{i}").as_str()), Some(&i));
        }
    }

    /// Invariant: after every successful new-key insert, len/capacity stays
    /// at or below 0.4.
    #[test]
    fn load_factor_bounded_after_every_insert() {
        let mut m: ChainMap<u64, u64> = ChainMap::new();
        for i in 0..500 {
            m.insert(i, i);
            let lf = m.len() as f64 / m.capacity() as f64;
            assert!(lf <= 0.4, "load factor {lf} after {} inserts", m.len());
        }
    }

    /// Invariant: colliding keys chain in append order and each remains
    /// reachable; updates through a chain touch only their own entry.
    #[test]
    fn collision_chain_appends_at_tail() {
        let mut m: ChainMap<&str, i32, ConstBuildHasher> =
            ChainMap::with_capacity_and_hasher(7, ConstBuildHasher);
        m.insert("a", 1);
        m.insert("b", 2);
        m.insert("c", 3);

        // All three share one bucket; enumeration order is append order.
        let order: Vec<&str> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec!["a", "b", "c"]);

        m.insert("b", 20);
        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(m.get("b"), Some(&20));
        assert_eq!(m.get("c"), Some(&3));
        assert_eq!(m.len(), 3);
    }

    /// Invariant: enumeration yields exactly `len()` entries with distinct
    /// keys matching the insert history (last write wins), across implicit
    /// resizes.
    #[test]
    fn enumeration_complete_under_resize() {
        let mut m: ChainMap<u32, u32> = ChainMap::with_capacity(3);
        let mut model: BTreeMap<u32, u32> = BTreeMap::new();
        for i in 0..100u32 {
            let k = i % 40; // mix of new keys and updates
            m.insert(k, i);
            model.insert(k, i);
        }

        let seen: BTreeMap<u32, u32> = m.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(seen.len(), m.len());
        assert_eq!(seen, model);
    }

    /// Invariant: `get_mut` and `iter_mut` observe and mutate the same
    /// entries the read-only traversal sees.
    #[test]
    fn mutable_access_matches_read_only_traversal() {
        let mut m: ChainMap<String, i32> = ChainMap::new();
        for (i, k) in ["k1", "k2", "k3"].iter().enumerate() {
            m.insert((*k).to_string(), i as i32);
        }

        *m.get_mut("k2").unwrap() += 100;
        assert_eq!(m.get("k2"), Some(&101));

        for (_k, v) in m.iter_mut() {
            *v += 1;
        }
        assert_eq!(m.get("k1"), Some(&1));
        assert_eq!(m.get("k2"), Some(&102));
        assert_eq!(m.get("k3"), Some(&3));
    }

    /// Invariant: a zero capacity request is clamped so the bucket modulus
    /// is always defined.
    #[test]
    fn zero_capacity_is_clamped() {
        let mut m: ChainMap<&str, i32> = ChainMap::with_capacity(0);
        assert_eq!(m.capacity(), 1);
        m.insert("a", 1);
        assert_eq!(m.get("a"), Some(&1));
    }

    /// Invariant: borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: ChainMap<String, i32> = ChainMap::new();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert!(!m.find("hello").is_end());
        assert!(m.find("world").is_end());
    }

    /// Invariant (stats feature): collisions and resizes are counted.
    #[cfg(feature = "stats")]
    #[test]
    fn stats_count_collisions_and_resizes() {
        let mut m: ChainMap<&str, i32, ConstBuildHasher> =
            ChainMap::with_capacity_and_hasher(50, ConstBuildHasher);
        m.insert("a", 1);
        m.insert("b", 2);
        assert_eq!(m.stats().collisions, 1);

        let mut n: ChainMap<u32, u32> = ChainMap::with_capacity(3);
        for i in 0..4 {
            n.insert(i, i);
        }
        assert!(n.stats().resizes >= 1);
    }
}
