//! Growable bit-set of action indices.

use std::fmt;

const WORD_BITS: usize = 64;

/// A set of action indices stored as a growable bit-vector.
///
/// Trailing zero words are trimmed after every removal, so two sets with
/// the same members always compare and hash equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ActionSet {
    words: Vec<u64>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// The set `{0, 1, .., count - 1}`.
    pub fn full(count: usize) -> Self {
        (0..count).collect()
    }

    /// Insert `index`, returning true if it was not already present.
    pub fn insert(&mut self, index: usize) -> bool {
        let (word, bit) = (index / WORD_BITS, index % WORD_BITS);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Remove `index`, returning true if it was present.
    pub fn remove(&mut self, index: usize) -> bool {
        let (word, bit) = (index / WORD_BITS, index % WORD_BITS);
        let Some(slot) = self.words.get_mut(word) else {
            return false;
        };
        let mask = 1u64 << bit;
        let present = *slot & mask != 0;
        *slot &= !mask;
        self.trim();
        present
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (index % WORD_BITS)) != 0)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &bits)| {
            (0..WORD_BITS)
                .filter(move |b| bits & (1u64 << b) != 0)
                .map(move |b| w * WORD_BITS + b)
        })
    }

    /// The `n`-th smallest member.
    pub fn nth(&self, n: usize) -> Option<usize> {
        self.iter().nth(n)
    }

    /// Add every member of `other`.
    pub fn union_with(&mut self, other: &ActionSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            *mine |= theirs;
        }
    }

    /// Members of `self` that are not in `other`.
    pub fn difference(&self, other: &ActionSet) -> ActionSet {
        let mut words: Vec<u64> = self
            .words
            .iter()
            .enumerate()
            .map(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0))
            .collect();
        while words.last() == Some(&0) {
            words.pop();
        }
        ActionSet { words }
    }

    pub fn is_subset(&self, other: &ActionSet) -> bool {
        self.difference(other).is_empty()
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl FromIterator<usize> for ActionSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = ActionSet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
