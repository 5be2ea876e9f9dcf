use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::{CredentialRecord, CredentialStore};
use crate::StoreError;

/// A credential store that keeps the pair in process memory
///
/// Clones share the same slot, so a test can keep a handle to observe what a
/// [`TokenAuthority`][crate::TokenAuthority] persisted.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCredentialStore {
    slot: Arc<Mutex<Option<CredentialRecord>>>,
}

impl InMemoryCredentialStore {
    /// Constructs an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a store that already holds `record`
    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(record))),
        }
    }

    /// A copy of the currently persisted record
    pub fn snapshot(&self) -> Option<CredentialRecord> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&mut self) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&mut self, record: &CredentialRecord) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_the_slot() {
        let mut store = InMemoryCredentialStore::new();
        let observer = store.clone();
        assert_eq!(store.load().await.unwrap(), None);

        store.save(&CredentialRecord::new("a", "r")).await.unwrap();

        assert_eq!(observer.snapshot(), Some(CredentialRecord::new("a", "r")));
    }

    #[tokio::test]
    async fn seeded_store_loads_its_record() {
        let mut store = InMemoryCredentialStore::with_record(CredentialRecord::new("a", "r"));

        assert_eq!(
            store.load().await.unwrap(),
            Some(CredentialRecord::new("a", "r"))
        );
    }
}
