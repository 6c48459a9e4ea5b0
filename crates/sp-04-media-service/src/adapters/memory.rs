//! In-memory media store and object storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::entities::{MediaId, MediaRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::domain::{RepositoryError, StorageError};
use crate::ports::{DeleteOutcome, MediaRepository, ObjectStorage, StoredObject};

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Default)]
pub struct InMemoryMediaRepository {
    records: RwLock<HashMap<MediaId, MediaRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryMediaRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        self.records.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "media store unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn insert(&self, record: MediaRecord) -> Result<(), RepositoryError> {
        self.check()?;
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn find(&self, id: &MediaId) -> Result<Option<MediaRecord>, RepositoryError> {
        self.check()?;
        Ok(self.records.read().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<MediaRecord>, RepositoryError> {
        self.check()?;
        let mut records: Vec<MediaRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn delete(&self, id: &MediaId) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self.records.write().remove(id).is_some())
    }
}

// =============================================================================
// BLOBS
// =============================================================================

/// Blob storage keyed by public id.
///
/// `fail_next_deletes(n)` makes the next `n` deletes fail, to exercise the
/// consumer's redelivery path.
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
    failing_deletes: AtomicU32,
    deletes: AtomicU64,
}

impl InMemoryObjectStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, count: u32) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    /// Seed a blob under a known public id.
    pub fn insert(&self, public_id: impl Into<String>, bytes: Vec<u8>) {
        self.objects.write().insert(public_id.into(), bytes);
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.objects.read().contains_key(public_id)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes that actually removed a blob.
    pub fn deletions(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "object storage unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(
        &self,
        _original_name: &str,
        _mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, StorageError> {
        self.check()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let public_id = format!("media/{n:08}");
        let url = format!("memory://{public_id}");
        self.objects.write().insert(public_id.clone(), bytes);
        Ok(StoredObject { public_id, url })
    }

    async fn delete_object(&self, public_id: &str) -> Result<DeleteOutcome, StorageError> {
        self.check()?;
        let failing = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StorageError::Unavailable(format!(
                "delete of {public_id} timed out"
            )));
        }

        if self.objects.write().remove(public_id).is_some() {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }
}
