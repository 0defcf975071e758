//! Open-addressed hash set keyed by object identity.
//!
//! Used as the "visited" registry while a computation graph is built: entries
//! are only ever added, membership is checked, and the whole set is cleared
//! in bulk between builds. Collisions are resolved with linear probing; there
//! is no per-entry deletion and therefore no tombstones.
//!
//! The table never grows. Size it with [`hash_size`] for the number of
//! distinct keys you intend to insert; probing a completely full table on
//! insert is a caller bug and panics.

use tracing::trace;

use crate::bitset::BitSet;

// ---------------------------------------------------------------------------
// Key identity
// ---------------------------------------------------------------------------

/// A key hashed and compared by a stable identity integer.
pub trait IdentityKey: Copy + Eq + Default {
    /// Low bits of [`identity`](Self::identity) that are always zero (for
    /// example because of alignment) and carry no information.
    const ALIGN_SHIFT: u32 = 0;

    /// Stable unique integer for this key.
    fn identity(&self) -> usize;
}

impl IdentityKey for usize {
    fn identity(&self) -> usize {
        *self
    }
}

impl IdentityKey for u32 {
    fn identity(&self) -> usize {
        *self as usize
    }
}

impl IdentityKey for u64 {
    fn identity(&self) -> usize {
        *self as usize
    }
}

/// Raw hash of a key. Reduced modulo the table size at lookup time.
#[inline]
pub fn identity_hash<K: IdentityKey>(key: &K) -> usize {
    key.identity() >> K::ALIGN_SHIFT
}

// ---------------------------------------------------------------------------
// Sizing
// ---------------------------------------------------------------------------

/// Minimum table capacity that safely holds `min_sz` distinct keys.
///
/// Returns the smallest prime that is at least `2 * min_sz`, keeping the load
/// factor at or below one half so probe sequences stay short and the table
/// can never be driven to full occupancy by `min_sz` insertions.
///
/// # Panics
/// Panics if no such prime fits in `usize`.
pub fn hash_size(min_sz: usize) -> usize {
    let mut candidate = min_sz
        .checked_mul(2)
        .unwrap_or_else(|| capacity_overflow(min_sz))
        .max(2);
    while !is_prime(candidate) {
        candidate = candidate
            .checked_add(1)
            .unwrap_or_else(|| capacity_overflow(min_sz));
    }
    candidate
}

#[cold]
fn capacity_overflow(min_sz: usize) -> usize {
    panic!(
        "hash set of {} keys needs more than usize::MAX / 2 slots",
        min_sz
    );
}

fn is_prime(n: usize) -> bool {
    if n < 4 {
        return n >= 2;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut d = 5usize;
    while d.saturating_mul(d) <= n {
        if n % d == 0 || n % (d + 2) == 0 {
            return false;
        }
        d += 6;
    }
    true
}

// ---------------------------------------------------------------------------
// IdentityHashSet
// ---------------------------------------------------------------------------

/// Fixed-capacity open-addressed set of identity keys.
///
/// `keys[i]` is only meaningful when `used.get(i)` is true.
#[derive(Debug, Clone)]
pub struct IdentityHashSet<K: IdentityKey> {
    size: usize,
    used: BitSet,
    keys: Box<[K]>,
    n_used: usize,
}

impl<K: IdentityKey> IdentityHashSet<K> {
    /// Create a set with exactly `size` slots.
    ///
    /// Prefer [`with_min_capacity`](Self::with_min_capacity) unless `size`
    /// already came from [`hash_size`].
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "hash set size must be positive");
        trace!(size, "created identity hash set");
        Self {
            size,
            used: BitSet::new(size),
            keys: vec![K::default(); size].into_boxed_slice(),
            n_used: 0,
        }
    }

    /// Create a set sized by [`hash_size`] for `min_sz` distinct keys.
    pub fn with_min_capacity(min_sz: usize) -> Self {
        Self::new(hash_size(min_sz))
    }

    /// Total number of slots.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_used
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_used == 0
    }

    /// Whether slot `i` holds a key.
    #[inline]
    pub fn is_used(&self, i: usize) -> bool {
        self.used.get(i)
    }

    /// The key stored in slot `i`, if the slot is occupied.
    pub fn key_at(&self, i: usize) -> Option<K> {
        self.used.get(i).then(|| self.keys[i])
    }

    /// Slot of `key` if present, otherwise the slot it would be inserted at.
    ///
    /// Returns `None` when every slot was visited without a match or a free
    /// slot, which can only happen on a completely full table.
    pub fn find(&self, key: K) -> Option<usize> {
        let h = identity_hash(&key) % self.size;

        // linear probing
        let mut i = h;
        while self.used.get(i) && self.keys[i] != key {
            i = (i + 1) % self.size;
            if i == h {
                return None;
            }
        }
        Some(i)
    }

    /// Whether `key` has been inserted since the last reset.
    pub fn contains(&self, key: K) -> bool {
        self.find(key).is_some_and(|i| self.used.get(i))
    }

    /// Insert `key`, returning its new slot, or `None` if it was already present.
    ///
    /// # Panics
    /// Panics if the table is full and `key` is absent.
    pub fn insert(&mut self, key: K) -> Option<usize> {
        match self.probe(key) {
            Probe::Vacant(i) => {
                self.occupy(i, key);
                Some(i)
            }
            Probe::Occupied(_) => None,
        }
    }

    /// Slot of `key`, inserting it first if absent.
    ///
    /// # Panics
    /// Panics if the table is full and `key` is absent.
    pub fn find_or_insert(&mut self, key: K) -> usize {
        match self.probe(key) {
            Probe::Vacant(i) => {
                self.occupy(i, key);
                i
            }
            Probe::Occupied(i) => i,
        }
    }

    /// Remove every key. Capacity and key storage are kept for reuse.
    pub fn reset(&mut self) {
        self.used.clear_all();
        self.n_used = 0;
    }

    /// Occupied keys in slot order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.size).filter_map(move |i| self.key_at(i))
    }

    fn probe(&self, key: K) -> Probe {
        let h = identity_hash(&key) % self.size;

        // linear probing
        let mut i = h;
        loop {
            if !self.used.get(i) {
                return Probe::Vacant(i);
            }
            if self.keys[i] == key {
                return Probe::Occupied(i);
            }
            i = (i + 1) % self.size;
            if i == h {
                break;
            }
        }

        panic!(
            "identity hash set is full ({} slots): size it with hash_size() before inserting",
            self.size
        );
    }

    #[inline]
    fn occupy(&mut self, i: usize, key: K) {
        self.used.set(i);
        self.keys[i] = key;
        self.n_used += 1;
    }
}

enum Probe {
    Vacant(usize),
    Occupied(usize),
}
