//! AtomRegistry: deduplicated ownership of identity-bearing atoms.
//!
//! An atom is any value exposing a stable string identifier. The registry
//! interns at most one atom per identifier for its whole lifetime and owns
//! every registered atom outright; callers get shared, read-only access.
//! There is no removal; atoms live until the registry drops.
//!
//! The registry is single-threaded like the rest of the crate. A process
//! normally uses one explicitly constructed registry threaded through the
//! program; [`AtomRegistry::instance`] offers a lazily-initialized
//! per-thread shared handle for code that cannot thread one through.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::chain_map::ChainMap;

/// Initial bucket count for the atom table. Deliberately large so the
/// expected atom population never triggers a resize.
const ATOM_TABLE_CAPACITY: usize = 103;

/// Contract for values the registry can intern.
///
/// The identifier must be stable: the registry captures it once at
/// registration and uses it as the lookup key from then on.
pub trait Atom {
    /// Stable string identifier this atom is keyed by.
    fn id(&self) -> &str;
}

thread_local! {
    static REGISTRY: Rc<AtomRegistry> = Rc::new(AtomRegistry::new());
}

/// Owner of all registered atoms, keyed by identifier.
pub struct AtomRegistry {
    atoms: RefCell<ChainMap<String, Rc<dyn Atom>>>,
    deallocating: Cell<bool>,
}

impl AtomRegistry {
    /// Create an empty registry. Prefer constructing one per program and
    /// passing it by reference; see [`AtomRegistry::instance`] for the
    /// shared-handle alternative.
    pub fn new() -> Self {
        Self {
            atoms: RefCell::new(ChainMap::with_capacity(ATOM_TABLE_CAPACITY)),
            deallocating: Cell::new(false),
        }
    }

    /// The lazily-initialized registry shared within the current thread.
    /// Every call returns a handle to the same instance, which lives until
    /// the thread exits.
    pub fn instance() -> Rc<AtomRegistry> {
        REGISTRY.with(Rc::clone)
    }

    /// Look up an atom by identifier. The registry's copy stays
    /// authoritative; the returned handle is shared read-only access.
    pub fn find_atom(&self, id: &str) -> Option<Rc<dyn Atom>> {
        self.atoms.borrow().get(id).cloned()
    }

    /// Register `atom` under its identifier, taking ownership.
    ///
    /// If the identifier is already taken the candidate is rejected and
    /// dropped, a diagnostic is logged, and `false` is returned; the
    /// previously registered atom is untouched. Callers constructing
    /// expensive atoms should check [`Self::find_atom`] first.
    pub fn register_atom(&self, atom: Rc<dyn Atom>) -> bool {
        let mut atoms = self.atoms.borrow_mut();
        let id = atom.id().to_string();
        if !atoms.find(id.as_str()).is_end() {
            log::warn!("attempted to register duplicate atom {id:?}; keeping the original");
            return false;
        }
        atoms.insert(id, atom);
        true
    }

    /// Number of distinct registered identifiers.
    pub fn len(&self) -> usize {
        self.atoms.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.borrow().is_empty()
    }

    /// Visit every registered atom, e.g. for diagnostics.
    pub fn for_each(&self, mut f: impl FnMut(&str, &Rc<dyn Atom>)) {
        for (id, atom) in self.atoms.borrow().iter() {
            f(id, atom);
        }
    }

    /// True only while this registry is being torn down. Lets atom-side
    /// `Drop` code tell coordinated end-of-life destruction apart from an
    /// improper early deallocation.
    pub fn is_deallocating(&self) -> bool {
        self.deallocating.get()
    }

    /// Whether the per-thread shared registry is in teardown. Also reports
    /// `true` once the thread-local slot itself is being destroyed, when
    /// the instance can no longer be reached.
    pub fn in_teardown() -> bool {
        REGISTRY
            .try_with(|r| r.is_deallocating())
            .unwrap_or(true)
    }
}

impl Default for AtomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AtomRegistry {
    fn drop(&mut self) {
        // Raise the flag before the atom table (and with it the atoms)
        // drops, so atom destructors observe the teardown phase.
        self.deallocating.set(true);
    }
}
