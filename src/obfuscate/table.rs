// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use std::collections::HashMap;
use std::hash::Hash;

/// Bidirectional mapping between synthetic values and the originals they
/// stand in for.  Both sides are unique, so the table is an injective
/// function in either direction.  Entries keep their allocation order, which
/// is also the order the CSV reports are written in.
#[derive(Debug)]
pub struct MappingTable<T> {
    entries: Vec<(T, T)>,
    by_original: HashMap<T, usize>,
    by_synthetic: HashMap<T, usize>,
}

impl<T> Default for MappingTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_original: HashMap::new(),
            by_synthetic: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> MappingTable<T> {
    /// Synthetic value already assigned to `original`, if any.
    pub fn synthetic_for(&self, original: &T) -> Option<&T> {
        self.by_original
            .get(original)
            .map(|&idx| &self.entries[idx].0)
    }

    pub fn contains_synthetic(&self, synthetic: &T) -> bool {
        self.by_synthetic.contains_key(synthetic)
    }

    /// Record a new pair.  Returns `false` and leaves the table untouched if
    /// either side is already present.
    pub fn insert(&mut self, synthetic: T, original: T) -> bool {
        if self.by_original.contains_key(&original) || self.by_synthetic.contains_key(&synthetic)
        {
            return false;
        }
        let idx = self.entries.len();
        self.by_original.insert(original.clone(), idx);
        self.by_synthetic.insert(synthetic.clone(), idx);
        self.entries.push((synthetic, original));
        true
    }

    /// Most recently allocated pair.
    pub fn last(&self) -> Option<&(T, T)> {
        self.entries.last()
    }

    /// `(synthetic, original)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &(T, T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicates_on_either_side() {
        let mut table = MappingTable::default();
        assert!(table.insert("a1".to_string(), "alpha".to_string()));
        assert!(!table.insert("a2".to_string(), "alpha".to_string()));
        assert!(!table.insert("a1".to_string(), "beta".to_string()));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.synthetic_for(&"alpha".to_string()),
            Some(&"a1".to_string())
        );
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut table = MappingTable::default();
        table.insert(3u32, 30u32);
        table.insert(1u32, 10u32);
        let pairs: Vec<_> = table.iter().copied().collect();
        assert_eq!(pairs, vec![(3, 30), (1, 10)]);
        assert_eq!(table.last(), Some(&(1, 10)));
    }
}
