//! Packed fixed-capacity bitset.
//!
//! Backs the occupancy map of [`IdentityHashSet`](crate::hash_set::IdentityHashSet).
//! Bit `i` lives in word `i >> 5` at position `i & 31`.

/// One backing word of the bitset.
pub type BitsetWord = u32;

const _: () = assert!(std::mem::size_of::<BitsetWord>() == 4);

/// log2 of the number of bits per word.
const BITSET_SHR: usize = 5;
/// Mask selecting the bit position within a word.
const BITSET_MASK: usize = BitsetWord::BITS as usize - 1;

/// Fixed-capacity packed boolean vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    words: Box<[BitsetWord]>,
    len: usize,
}

impl BitSet {
    /// Number of 32-bit words needed to back `n` flags.
    #[inline]
    pub const fn size_for(n: usize) -> usize {
        (n + BITSET_MASK) >> BITSET_SHR
    }

    /// Create a bitset of `n` flags, all cleared.
    pub fn new(n: usize) -> Self {
        Self {
            words: vec![0; Self::size_for(n)].into_boxed_slice(),
            len: n,
        }
    }

    /// Number of flags this bitset backs.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The backing words.
    pub fn words(&self) -> &[BitsetWord] {
        &self.words
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.words[i >> BITSET_SHR] & (1 << (i & BITSET_MASK)) != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        self.words[i >> BITSET_SHR] |= 1 << (i & BITSET_MASK);
    }

    #[inline]
    pub fn clear(&mut self, i: usize) {
        self.words[i >> BITSET_SHR] &= !(1 << (i & BITSET_MASK));
    }

    /// Clear every flag, keeping the allocation.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Number of flags currently set.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}
