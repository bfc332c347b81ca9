//! Growable bitset over inventory indices
//!
//! Converters link to inventories through these sets rather than owning
//! references, so removing an inventory can never leave a dangling link:
//! the processor simply rebuilds every set.

use serde::{Deserialize, Serialize};

use crate::core::types::InventoryIndex;

const WORD_BITS: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySet {
    words: Vec<u64>,
}

impl InventorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(WORD_BITS)),
        }
    }

    pub fn insert(&mut self, index: InventoryIndex) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }

    pub fn remove(&mut self, index: InventoryIndex) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1u64 << (index % WORD_BITS));
        }
    }

    pub fn contains(&self, index: InventoryIndex) -> bool {
        self.words
            .get(index / WORD_BITS)
            .map(|word| word & (1u64 << (index % WORD_BITS)) != 0)
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate set indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = InventoryIndex> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| w * WORD_BITS + bit)
        })
    }
}

impl FromIterator<InventoryIndex> for InventorySet {
    fn from_iter<T: IntoIterator<Item = InventoryIndex>>(iter: T) -> Self {
        let mut set = InventorySet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}
