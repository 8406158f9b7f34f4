use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domain::interaction::{
    InteractionChanges, InteractionError, InteractionRecord, InteractionRecordStore,
};
use domain::value::InteractionKey;
use std::sync::Arc;

/// Keyed record store held in memory. Records are stored without pending effects.
#[derive(Clone, Default)]
pub struct InMemoryInteractionRecordStore {
    store: Arc<DashMap<InteractionKey, InteractionRecord>>,
}

impl InMemoryInteractionRecordStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl InteractionRecordStore for InMemoryInteractionRecordStore {
    async fn find(
        &self,
        key: &InteractionKey,
    ) -> Result<Option<InteractionRecord>, InteractionError> {
        Ok(self.store.get(key).map(|v| v.clone()))
    }

    async fn insert(&self, record: &InteractionRecord) -> Result<(), InteractionError> {
        match self.store.entry(record.key()) {
            Entry::Occupied(_) => Err(InteractionError::DuplicateKey(record.key())),
            Entry::Vacant(slot) => {
                let mut stored = record.clone();
                stored.pending_effects.clear();
                slot.insert(stored);
                Ok(())
            }
        }
    }

    async fn update_fields(
        &self,
        key: &InteractionKey,
        changes: &InteractionChanges,
    ) -> Result<(), InteractionError> {
        let mut stored = self
            .store
            .get_mut(key)
            .ok_or(InteractionError::NotFound(*key))?;
        changes.apply_to(&mut stored)
    }
}
