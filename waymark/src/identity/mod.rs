//! Identity Index
//!
//! Assigns stable marker ids to anchors that carry no durable identifier.
//! Works like a content-addressed cache: the anchor's [`Fingerprint`] is looked
//! up in an insertion-ordered map (seeded from the store at startup); on a miss
//! a base-36 id is derived from the fingerprint and recorded.
//!
//! Collisions (the derived id already bound to a different fingerprint) are
//! resolved deterministically by suffixing a short hash of `fingerprint + attempt`.
//! After [`MAX_COLLISION_ATTEMPTS`] the index falls back to a timestamp suffix,
//! which is unique but not reproducible across sessions.

mod fingerprint;

pub use fingerprint::{
    Fingerprint, content_signature, fingerprint, normalize_timestamp, normalize_whitespace,
};

use std::collections::HashMap;

use indexmap::IndexMap;
use waymark_api::{Anchor, KeyValueStore, MarkerId, StoreError};

use crate::hash::{hash36, short_hash, to_base36};
use crate::store::{load_json, save_json};

/// Deterministic suffix attempts before the timestamp fallback.
pub const MAX_COLLISION_ATTEMPTS: u32 = 10;

/// Persisted, bounded fingerprint -> id map.
#[derive(Debug)]
pub struct IdentityIndex {
    conversation_key: String,
    /// Insertion-ordered; the front is evicted first.
    by_fingerprint: IndexMap<Fingerprint, MarkerId>,
    by_id: HashMap<MarkerId, Fingerprint>,
    limit: usize,
    dirty: bool,
    fallback_count: u64,
    fallback_seq: u64,
}

impl IdentityIndex {
    /// Create an empty index.
    pub fn new(conversation_key: impl Into<String>, limit: usize) -> Self {
        Self {
            conversation_key: conversation_key.into(),
            by_fingerprint: IndexMap::new(),
            by_id: HashMap::new(),
            limit: limit.max(1),
            dirty: false,
            fallback_count: 0,
            fallback_seq: 0,
        }
    }

    /// Create an index seeded from `store[key]`.
    ///
    /// A missing or malformed entry seeds nothing. If the stored map is larger
    /// than `limit`, only the newest `limit` pairs are kept.
    pub fn load(
        store: &dyn KeyValueStore,
        key: &str,
        conversation_key: impl Into<String>,
        limit: usize,
    ) -> Self {
        let mut index = Self::new(conversation_key, limit);
        let pairs: Vec<(String, String)> = load_json(store, key).unwrap_or_default();
        let skip = pairs.len().saturating_sub(index.limit);
        for (fp, id) in pairs.into_iter().skip(skip) {
            index.bind(Fingerprint(fp), MarkerId(id));
        }
        index.dirty = false;
        tracing::debug!("Identity index seeded with {} entries", index.len());
        index
    }

    /// Resolve the stable id for an anchor.
    ///
    /// Deterministic for a given conversation key, role, content and timestamp
    /// as long as the persisted map survives (and the fallback path is not hit).
    pub fn resolve(&mut self, anchor: &Anchor) -> MarkerId {
        let fp = fingerprint(&self.conversation_key, anchor);
        self.resolve_fingerprint(anchor, fp)
    }

    /// Resolve ids for an ordered anchor list, unique within the list.
    ///
    /// Anchors with identical content share a fingerprint; from the second
    /// occurrence on, the occurrence number is mixed into the fingerprint so
    /// each repeat gets its own id, stable as long as the order of repeats is.
    pub fn resolve_all(&mut self, anchors: &[Anchor]) -> Vec<MarkerId> {
        let mut seen: HashMap<Fingerprint, u32> = HashMap::new();
        let mut ids = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            let fp = fingerprint(&self.conversation_key, anchor);
            let count = seen.entry(fp.clone()).or_insert(0);
            let occurrence = *count;
            *count += 1;
            ids.push(self.resolve_fingerprint(anchor, fp.repeated(occurrence)));
        }
        ids
    }

    fn resolve_fingerprint(&mut self, anchor: &Anchor, fp: Fingerprint) -> MarkerId {
        if let Some(durable) = anchor.durable_id.as_deref().filter(|s| !s.is_empty()) {
            let id = MarkerId::new(durable);
            if self.by_fingerprint.get(&fp) != Some(&id) {
                self.bind(fp, id.clone());
            }
            return id;
        }

        if let Some(id) = self.by_fingerprint.get(&fp) {
            return id.clone();
        }

        let id = self.derive_unique(&fp);
        self.bind(fp, id.clone());
        id
    }

    /// Candidate id for a fingerprint before collision handling.
    pub fn candidate_id(fp: &Fingerprint) -> MarkerId {
        MarkerId(format!("m{}", hash36(fp.as_str())))
    }

    fn derive_unique(&mut self, fp: &Fingerprint) -> MarkerId {
        let base = Self::candidate_id(fp);
        if self.is_free_for(&base, fp) {
            return base;
        }

        for attempt in 1..=MAX_COLLISION_ATTEMPTS {
            let candidate = MarkerId(format!(
                "{}-{}",
                base,
                short_hash(&format!("{}{}", fp, attempt))
            ));
            if self.is_free_for(&candidate, fp) {
                tracing::debug!("Resolved id collision for {} after {} attempts", fp, attempt);
                return candidate;
            }
        }

        self.fallback_count += 1;
        let stamp = to_base36(chrono::Utc::now().timestamp_millis().max(0) as u64);
        loop {
            self.fallback_seq += 1;
            let candidate = MarkerId(format!(
                "{}-t{}{}",
                base,
                stamp,
                to_base36(self.fallback_seq)
            ));
            if self.is_free_for(&candidate, fp) {
                tracing::warn!(
                    "Id collisions exhausted for {}; using non-deterministic id {} (fallback #{})",
                    fp,
                    candidate,
                    self.fallback_count
                );
                return candidate;
            }
        }
    }

    fn is_free_for(&self, id: &MarkerId, fp: &Fingerprint) -> bool {
        self.by_id.get(id).is_none_or(|owner| owner == fp)
    }

    /// Record `fp -> id`, evicting the oldest entries when at the limit.
    fn bind(&mut self, fp: Fingerprint, id: MarkerId) {
        // Keep the reverse map one-to-one.
        if let Some(previous_owner) = self.by_id.get(&id).cloned() {
            if previous_owner != fp {
                self.by_fingerprint.shift_remove(&previous_owner);
            }
        }

        if let Some(old_id) = self.by_fingerprint.get(&fp).cloned() {
            self.by_id.remove(&old_id);
            self.by_fingerprint.insert(fp.clone(), id.clone());
        } else {
            while self.by_fingerprint.len() >= self.limit {
                match self.by_fingerprint.shift_remove_index(0) {
                    Some((_, evicted)) => {
                        self.by_id.remove(&evicted);
                    }
                    None => break,
                }
            }
            self.by_fingerprint.insert(fp.clone(), id.clone());
        }
        self.by_id.insert(id, fp);
        self.dirty = true;
    }

    /// Write the map to `store[key]` if it changed since the last flush.
    ///
    /// On error the index stays dirty; the caller decides whether to retry.
    pub fn flush(&mut self, store: &mut dyn KeyValueStore, key: &str) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let pairs: Vec<(&str, &str)> = self
            .by_fingerprint
            .iter()
            .map(|(fp, id)| (fp.as_str(), id.as_str()))
            .collect();
        save_json(store, key, &pairs)?;
        self.dirty = false;
        tracing::debug!("Flushed {} identity entries", pairs.len());
        Ok(())
    }

    pub fn get(&self, fp: &Fingerprint) -> Option<&MarkerId> {
        self.by_fingerprint.get(fp)
    }

    pub fn contains_id(&self, id: &MarkerId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// How many ids this session were assigned through the timestamp fallback.
    pub fn fallback_count(&self) -> u64 {
        self.fallback_count
    }

    pub fn conversation_key(&self) -> &str {
        &self.conversation_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use waymark_api::{AnchorRef, Role};

    const KEY: &str = "waymark:ids:test";

    fn anchor(text: &str) -> Anchor {
        Anchor::new(AnchorRef(0), 0.0, text).with_role(Role::User)
    }

    #[test]
    fn resolve_is_deterministic_within_a_session() {
        let mut index = IdentityIndex::new("chat", 100);
        let a = anchor("first message").with_timestamp("2024-05-01T10:00:00Z");
        let id1 = index.resolve(&a);
        let id2 = index.resolve(&a);
        assert_eq!(id1, id2);
        assert_eq!(index.len(), 1);
        assert!(id1.as_str().starts_with('m'));
    }

    #[test]
    fn fresh_index_without_store_derives_same_id() {
        let a = anchor("stable across sessions");
        let id1 = IdentityIndex::new("chat", 100).resolve(&a);
        let id2 = IdentityIndex::new("chat", 100).resolve(&a);
        assert_eq!(id1, id2);
    }

    #[test]
    fn reload_from_store_returns_same_ids() {
        let mut store = MemoryStore::new();
        let anchors: Vec<_> = (0..5).map(|i| anchor(&format!("message {i}"))).collect();

        let mut index = IdentityIndex::new("chat", 100);
        let ids: Vec<_> = anchors.iter().map(|a| index.resolve(a)).collect();
        assert!(index.is_dirty());
        index.flush(&mut store, KEY).unwrap();
        assert!(!index.is_dirty());

        let mut reloaded = IdentityIndex::load(&store, KEY, "chat", 100);
        assert_eq!(reloaded.len(), 5);
        assert!(!reloaded.is_dirty());
        let again: Vec<_> = anchors.iter().map(|a| reloaded.resolve(a)).collect();
        assert_eq!(ids, again);
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn durable_id_is_used_and_recorded() {
        let mut index = IdentityIndex::new("chat", 100);
        let a = anchor("hello").with_durable_id("msg-123");
        assert_eq!(index.resolve(&a), MarkerId::new("msg-123"));

        // Same content, host stopped exposing the id.
        let mut b = a.clone();
        b.durable_id = None;
        assert_eq!(index.resolve(&b), MarkerId::new("msg-123"));
    }

    #[test]
    fn collision_takes_deterministic_suffix() {
        let a = anchor("collides");
        let fp = fingerprint("chat", &a);
        let candidate = IdentityIndex::candidate_id(&fp);

        let mut index = IdentityIndex::new("chat", 100);
        index.bind(Fingerprint("someone-else".into()), candidate.clone());

        let id = index.resolve(&a);
        assert_ne!(id, candidate);
        let expected_suffix = short_hash(&format!("{}1", fp));
        assert_eq!(id.as_str(), format!("{}-{}", candidate, expected_suffix));
        assert_eq!(index.fallback_count(), 0);
    }

    #[test]
    fn exhausted_collisions_fall_back_to_unique_id() {
        let a = anchor("pathological");
        let fp = fingerprint("chat", &a);
        let base = IdentityIndex::candidate_id(&fp);

        let mut index = IdentityIndex::new("chat", 100);
        index.bind(Fingerprint("other-0".into()), base.clone());
        for attempt in 1..=MAX_COLLISION_ATTEMPTS {
            let taken = MarkerId(format!(
                "{}-{}",
                base,
                short_hash(&format!("{}{}", fp, attempt))
            ));
            index.bind(Fingerprint(format!("other-{attempt}")), taken);
        }

        let id = index.resolve(&a);
        assert!(id.as_str().starts_with(&format!("{}-t", base)), "{id}");
        assert_eq!(index.fallback_count(), 1);
        // Once bound, later lookups are stable for the session.
        assert_eq!(index.resolve(&a), id);
    }

    #[test]
    fn repeated_content_gets_distinct_stable_ids() {
        let anchors = vec![
            anchor("continue"),
            Anchor::new(AnchorRef(1), 100.0, "long answer").with_role(Role::Assistant),
            anchor("continue"),
            anchor("continue"),
        ];

        let mut index = IdentityIndex::new("chat", 100);
        let ids = index.resolve_all(&anchors);
        assert_ne!(ids[0], ids[2]);
        assert_ne!(ids[2], ids[3]);
        assert_ne!(ids[0], ids[3]);
        // The first occurrence keeps the plain fingerprint's id.
        assert_eq!(ids[0], index.resolve(&anchors[0]));

        let again = IdentityIndex::new("chat", 100).resolve_all(&anchors);
        assert_eq!(ids, again);
    }

    #[test]
    fn evicts_oldest_at_limit() {
        let mut index = IdentityIndex::new("chat", 3);
        let anchors: Vec<_> = (0..4).map(|i| anchor(&format!("m{i}"))).collect();
        let ids: Vec<_> = anchors.iter().map(|a| index.resolve(a)).collect();

        assert_eq!(index.len(), 3);
        assert!(index.get(&fingerprint("chat", &anchors[0])).is_none());
        assert!(!index.contains_id(&ids[0]));
        for (a, id) in anchors.iter().zip(&ids).skip(1) {
            assert_eq!(index.get(&fingerprint("chat", a)), Some(id));
        }
    }

    #[test]
    fn load_keeps_newest_entries_when_over_limit() {
        let mut store = MemoryStore::new();
        let pairs: Vec<(String, String)> =
            (0..5).map(|i| (format!("fp{i}"), format!("id{i}"))).collect();
        save_json(&mut store, KEY, &pairs).unwrap();

        let index = IdentityIndex::load(&store, KEY, "chat", 2);
        assert_eq!(index.len(), 2);
        assert!(index.contains_id(&MarkerId::new("id3")));
        assert!(index.contains_id(&MarkerId::new("id4")));
    }

    #[test]
    fn malformed_store_loads_empty() {
        let mut store = MemoryStore::new();
        store.set(KEY, "[[\"fp\"").unwrap();
        let index = IdentityIndex::load(&store, KEY, "chat", 10);
        assert!(index.is_empty());
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disabled".into()))
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disabled".into()))
        }
    }

    #[test]
    fn unavailable_store_keeps_ids_in_memory() {
        let mut store = FailingStore;
        let mut index = IdentityIndex::load(&store, KEY, "chat", 10);
        let a = anchor("still works");
        let id = index.resolve(&a);
        assert!(index.flush(&mut store, KEY).is_err());
        assert!(index.is_dirty());
        assert_eq!(index.resolve(&a), id);
    }
}
