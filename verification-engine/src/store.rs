//! Project repository.
//!
//! The repository is the single shared mutable resource. Writes are
//! compare-and-swap on the record version; reads of the whole collection
//! happen under one lock so callers always see a consistent snapshot.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use registry_types::WorkflowError;

use crate::project::ProjectRecord;

/// Error types for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record under this ID
    #[error("Project not found: {0}")]
    NotFound(String),

    /// ID already taken
    #[error("Project already exists: {0}")]
    AlreadyExists(String),

    /// Stored version differs from the one the writer read
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict { id: String, expected: u64, actual: u64 },

    /// Backing storage cannot be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WorkflowError::ProjectNotFound(id),
            StoreError::AlreadyExists(id) => WorkflowError::ProjectAlreadyExists(id),
            StoreError::VersionConflict {
                id,
                expected,
                actual,
            } => WorkflowError::ConcurrentModification {
                project_id: id,
                expected,
                actual,
            },
            StoreError::Unavailable(msg) => WorkflowError::StorageUnavailable(msg),
        }
    }
}

/// Storage for project aggregates.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Insert a new record. Fails if the ID exists.
    async fn insert(&self, record: ProjectRecord) -> Result<ProjectRecord, StoreError>;

    /// Fetch one record.
    async fn get(&self, id: &str) -> Result<ProjectRecord, StoreError>;

    /// Every record, read atomically.
    async fn snapshot(&self) -> Result<Vec<ProjectRecord>, StoreError>;

    /// Replace a record if its stored version still equals `expected_version`.
    ///
    /// The stored record's version becomes `expected_version + 1`.
    async fn commit(
        &self,
        record: ProjectRecord,
        expected_version: u64,
    ) -> Result<ProjectRecord, StoreError>;
}

/// In-memory repository.
pub struct InMemoryProjectStore {
    projects: Arc<RwLock<HashMap<String, ProjectRecord>>>,
    available: AtomicBool,
}

impl InMemoryProjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            projects: Arc::new(RwLock::new(HashMap::new())),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing or regaining the backing storage.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store marked offline".to_string(),
            ))
        }
    }
}

impl Default for InMemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectStore {
    async fn insert(&self, record: ProjectRecord) -> Result<ProjectRecord, StoreError> {
        self.ensure_available()?;
        let mut projects = self.projects.write().await;
        if projects.contains_key(record.id()) {
            return Err(StoreError::AlreadyExists(record.id().to_string()));
        }
        projects.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<ProjectRecord, StoreError> {
        self.ensure_available()?;
        let projects = self.projects.read().await;
        projects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn snapshot(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        self.ensure_available()?;
        let projects = self.projects.read().await;
        Ok(projects.values().cloned().collect())
    }

    async fn commit(
        &self,
        mut record: ProjectRecord,
        expected_version: u64,
    ) -> Result<ProjectRecord, StoreError> {
        self.ensure_available()?;
        let mut projects = self.projects.write().await;
        let current = projects
            .get(record.id())
            .ok_or_else(|| StoreError::NotFound(record.id().to_string()))?;

        if current.version() != expected_version {
            return Err(StoreError::VersionConflict {
                id: record.id().to_string(),
                expected: expected_version,
                actual: current.version(),
            });
        }

        record.set_version(expected_version + 1);
        projects.insert(record.id().to_string(), record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::tests::sample_project;
    use chrono::Utc;
    use registry_types::{ActorContext, ActorRole, Stage};

    fn record(id: &str) -> ProjectRecord {
        let actor = ActorContext::new("admin", ActorRole::Administrator);
        ProjectRecord::new(sample_project(id), &actor, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryProjectStore::new();
        store.insert(record("NCCR-2024-001")).await.unwrap();

        let fetched = store.get("NCCR-2024-001").await.unwrap();
        assert_eq!(fetched.id(), "NCCR-2024-001");

        assert!(matches!(
            store.insert(record("NCCR-2024-001")).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.get("NCCR-2024-999").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_is_compare_and_swap() {
        let store = InMemoryProjectStore::new();
        store.insert(record("NCCR-2024-001")).await.unwrap();
        let actor = ActorContext::system();

        let mut first = store.get("NCCR-2024-001").await.unwrap();
        let mut second = first.clone();

        first.apply_transition(Stage::ExpertReview, &actor, "a", Utc::now());
        let committed = store.commit(first, 0).await.unwrap();
        assert_eq!(committed.version(), 1);

        second.apply_transition(Stage::TamperedData, &actor, "b", Utc::now());
        let err = store.commit(second, 0).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));

        let stored = store.get("NCCR-2024-001").await.unwrap();
        assert_eq!(stored.stage(), Stage::ExpertReview);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryProjectStore::new();
        store.set_available(false);
        let err = store.snapshot().await.unwrap_err();
        let workflow: WorkflowError = err.into();
        assert!(workflow.is_fatal());
    }
}
