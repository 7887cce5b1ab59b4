//! Rumble effects uploaded by games, keyed by kernel effect id

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectRecord {
    pub strong: u16,
    pub weak: u16,
    pub length_ms: u16,
}

impl EffectRecord {
    pub fn is_silent(&self) -> bool {
        self.strong == 0 && self.weak == 0
    }
}

/// At most one record per effect id. Written by the upload/erase path and
/// read by the play path.
#[derive(Debug, Default)]
pub struct EffectStore {
    effects: Mutex<HashMap<i16, EffectRecord>>,
}

impl EffectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites; returns the replaced record
    pub fn upsert(&self, id: i16, record: EffectRecord) -> Option<EffectRecord> {
        self.effects.lock().insert(id, record)
    }

    /// Removing an unknown id is a no-op
    pub fn remove(&self, id: i16) -> Option<EffectRecord> {
        self.effects.lock().remove(&id)
    }

    pub fn get(&self, id: i16) -> Option<EffectRecord> {
        self.effects.lock().get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.effects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_overwrites_same_id() {
        let store = EffectStore::new();
        let first = EffectRecord {
            strong: 1,
            weak: 2,
            length_ms: 3,
        };
        let second = EffectRecord {
            strong: 4,
            weak: 5,
            length_ms: 6,
        };
        assert_eq!(store.upsert(7, first), None);
        assert_eq!(store.upsert(7, second), Some(first));
        assert_eq!(store.get(7), Some(second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let store = EffectStore::new();
        assert_eq!(store.remove(-1), None);
        assert!(store.is_empty());
    }
}
