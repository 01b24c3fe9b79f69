//! In-memory stores for development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{Job, ObjectStore, SubmissionStatus, SubmissionStore};
use crate::util::serde::JobId;

/// Keeps the latest status for each submission id.
#[derive(Debug, Default)]
pub struct InMemorySubmissionStore {
    statuses: Mutex<HashMap<JobId, SubmissionStatus>>,
    failing: AtomicBool,
}

impl InMemorySubmissionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Latest recorded status.
    #[must_use]
    pub fn status(&self, id: &str) -> Option<SubmissionStatus> {
        self.statuses.lock().get(id).copied()
    }

    /// Number of submissions recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.lock().len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), String> {
        if self.failing.load(Ordering::Acquire) {
            Err("submission store unavailable".into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn create(&self, job: &Job) -> Result<JobId, String> {
        self.check()?;
        self.statuses
            .lock()
            .insert(job.id.clone(), SubmissionStatus::Admitted);
        Ok(job.id.clone())
    }

    async fn update_status(&self, id: &str, status: SubmissionStatus) -> Result<(), String> {
        self.check()?;
        match self.statuses.lock().get_mut(id) {
            Some(slot) => {
                *slot = status;
                Ok(())
            }
            None => Err(format!("unknown submission {id}")),
        }
    }
}

/// Blob store keyed by generated uuids.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, code: &[u8], metadata: &[(String, String)]) -> Result<String, String> {
        let key = format!("submissions/{}", uuid::Uuid::new_v4());
        tracing::trace!(key = %key, bytes = code.len(), metadata = metadata.len(), "object stored");
        self.objects.lock().insert(key.clone(), code.to_vec());
        Ok(key)
    }
}
