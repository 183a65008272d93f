//! Starred markers, persisted as a JSON array of ids.

use std::collections::BTreeSet;

use waymark_api::{KeyValueStore, MarkerId, StoreError};

use crate::store::{load_json, save_json};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StarredSet {
    ids: BTreeSet<MarkerId>,
}

impl StarredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `store[key]`; missing or malformed data loads empty.
    pub fn load(store: &dyn KeyValueStore, key: &str) -> Self {
        let ids: Vec<MarkerId> = load_json(store, key).unwrap_or_default();
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore, key: &str) -> Result<(), StoreError> {
        save_json(store, key, &self.ids)
    }

    pub fn contains(&self, id: &MarkerId) -> bool {
        self.ids.contains(id)
    }

    /// Flip the flag for `id`; returns the new state.
    pub fn toggle(&mut self, id: &MarkerId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarkerId> {
        self.ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn toggle_twice_restores_flag_and_persisted_set() {
        let mut store = MemoryStore::new();
        let mut stars = StarredSet::new();
        stars.toggle(&MarkerId::new("a"));
        stars.toggle(&MarkerId::new("c"));
        stars.save(&mut store, "stars").unwrap();
        let before = store.get("stars").unwrap();

        let b = MarkerId::new("b");
        assert!(stars.toggle(&b));
        stars.save(&mut store, "stars").unwrap();
        assert!(!stars.toggle(&b));
        stars.save(&mut store, "stars").unwrap();

        assert!(!stars.contains(&b));
        assert_eq!(store.get("stars").unwrap(), before);
    }

    #[test]
    fn load_round_trips() {
        let mut store = MemoryStore::new();
        let mut stars = StarredSet::new();
        stars.toggle(&MarkerId::new("x"));
        stars.save(&mut store, "stars").unwrap();
        assert_eq!(store.get("stars").unwrap().as_deref(), Some("[\"x\"]"));

        let loaded = StarredSet::load(&store, "stars");
        assert_eq!(loaded, stars);
    }

    #[test]
    fn malformed_loads_empty() {
        let mut store = MemoryStore::new();
        store.set("stars", "{\"x\": 1}").unwrap();
        assert!(StarredSet::load(&store, "stars").is_empty());
    }
}
