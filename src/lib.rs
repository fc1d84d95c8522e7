//! chain-hashmap: a single-threaded, separately-chained hash map traversed
//! through entry cursors, plus an atom interning registry built on it.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: implement separate chaining from first principles in safe,
//!   verifiable layers, with the collision and growth behavior fully
//!   specified rather than delegated to a probing table.
//! - Layers:
//!   - ChainMap<K, V, S>: bucket vector of chain heads over a slotmap
//!     arena of entries; insert/find/iterate plus the threshold-triggered
//!     all-at-once rehash (grow to `len * 3 + 5` buckets once the load
//!     factor passes 0.4).
//!   - Cursor / Iter / IterMut: one traversal algorithm (chain successor,
//!     then forward bucket scan) exposed as a detached handle and as two
//!     capability-restricted iterator views.
//!   - AtomRegistry: deduplicated, process-lifetime ownership of
//!     identity-bearing values keyed by their string identifier.
//!
//! Constraints
//! - Single-threaded: no locking; the registry uses `RefCell`/`Cell`
//!   interior mutability. The only atomic is the process-wide counter
//!   that mints table identities for the cursor origin check.
//! - Chain successors are arena handles, never owning pointers, so chains
//!   cannot own a cycle; links are only created by tail append and resize
//!   relinking, both of which clear successors first.
//! - Each entry stores its `u64` hash at insertion; resizing recomputes
//!   bucket indices from stored hashes and never re-invokes `K: Hash`.
//! - Resize is all-or-nothing and bypasses `insert` so the entry count is
//!   untouched; it bumps a generation counter that detects stale cursors.
//!
//! Cursor invalidation
//! - Every resize invalidates outstanding cursors. This is a documented
//!   precondition of the container; as a defensive measure, dereferencing
//!   or advancing a cursor minted under an earlier generation panics
//!   instead of observing the rebuilt chain layout. Re-derive cursors via
//!   `find`/`begin` after any insert that may have grown the table.
//! - Cursors are bound to their origin table. Each table carries a
//!   process-unique identity; applying an entry cursor to a different
//!   table panics instead of resolving against the wrong arena. The end
//!   sentinel belongs to no table and stays universal.
//!
//! Notes and non-goals
//! - No key removal and no insertion-order guarantee; completeness and
//!   uniqueness of stored keys are the contract.
//! - Pathological hash collisions degrade lookup to linear chain walks;
//!   accepted trade-off, the growth policy keeps chains short for
//!   well-distributed hashes.
//! - The registry rejects duplicate identifiers by dropping the candidate
//!   and logging a diagnostic; callers constructing expensive atoms should
//!   probe `find_atom` first.
//! - `stats` feature: per-table collision/resize counters via
//!   `ChainMap::stats()`.

pub mod chain_map;
mod chain_map_proptest;
pub mod cursor;
pub mod registry;

/// Default [`core::hash::BuildHasher`] for [`ChainMap`].
///
/// Seeded at compile time (`compile-time-rng`), so tables built with
/// `Default` state need no runtime entropy source.
pub type DefaultHashBuilder = ahash::RandomState;

// Public surface
#[cfg(feature = "stats")]
pub use chain_map::Stats;
pub use chain_map::{ChainMap, DEFAULT_CAPACITY};
pub use cursor::{Cursor, Iter, IterMut};
pub use registry::{Atom, AtomRegistry};
