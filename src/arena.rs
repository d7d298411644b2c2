use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

/// An insertion-ordered collection keyed by an opaque identity.
///
/// Lookups go through a hash index, iteration follows insertion order, and
/// removal is O(log n). Used for heads and for the modes of each head, where
/// the compositor decides when entries come and go.
#[derive(Debug, Clone)]
pub struct OrderedArena<K, V> {
    entries: BTreeMap<u64, (K, V)>,
    index: HashMap<K, u64>,
    next_seq: u64,
}

impl<K, V> Default for OrderedArena<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Clone + Eq + Hash, V> OrderedArena<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` at the end. An existing entry under the same key is
    /// dropped and returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.remove(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(key.clone(), seq);
        self.entries.insert(seq, (key, value));
        previous
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let seq = self.index.remove(key)?;
        self.entries.remove(&seq).map(|(_, value)| value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let seq = self.index.get(key)?;
        self.entries.get(seq).map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let seq = self.index.get(key)?;
        self.entries.get_mut(seq).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.values().map(|(key, value)| (key, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|(_, value)| value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut().map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.values().map(|(key, _)| key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_follows_insertion_order() {
        let mut arena = OrderedArena::new();
        arena.insert(30u32, "c");
        arena.insert(10u32, "a");
        arena.insert(20u32, "b");

        let keys: Vec<_> = arena.keys().copied().collect();
        assert_eq!(keys, vec![30, 10, 20]);
    }

    #[test]
    fn removal_keeps_remaining_order() {
        let mut arena = OrderedArena::new();
        for key in 0u32..5 {
            arena.insert(key, key * 10);
        }

        assert_eq!(arena.remove(&2), Some(20));
        assert_eq!(arena.remove(&2), None);
        assert!(!arena.contains_key(&2));

        let values: Vec<_> = arena.values().copied().collect();
        assert_eq!(values, vec![0, 10, 30, 40]);
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn reinserting_a_key_moves_it_to_the_end() {
        let mut arena = OrderedArena::new();
        arena.insert(1u32, "first");
        arena.insert(2u32, "second");

        assert_eq!(arena.insert(1u32, "again"), Some("first"));

        let entries: Vec<_> = arena.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(entries, vec![(2, "second"), (1, "again")]);
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut arena = OrderedArena::new();
        arena.insert("a", 1);
        if let Some(value) = arena.get_mut(&"a") {
            *value = 7;
        }
        assert_eq!(arena.get(&"a"), Some(&7));
        assert!(arena.get(&"missing").is_none());
    }
}
