//! Append-only storage for compliance results.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use registry_types::ComplianceCheckResult;

use crate::store::StoreError;

/// Storage for recorded compliance runs.
///
/// Results are append-only; there is no update or delete.
#[async_trait]
pub trait ComplianceResultStore: Send + Sync {
    /// Persist a completed run.
    async fn record(&self, result: ComplianceCheckResult) -> Result<(), StoreError>;

    /// Most recently recorded run for a project.
    async fn latest_for(&self, project_id: &str) -> Result<Option<ComplianceCheckResult>, StoreError>;

    /// Every run for a project, oldest first.
    async fn history_for(&self, project_id: &str) -> Result<Vec<ComplianceCheckResult>, StoreError>;
}

/// In-memory result store.
pub struct InMemoryResultStore {
    results: Arc<RwLock<HashMap<String, Vec<ComplianceCheckResult>>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComplianceResultStore for InMemoryResultStore {
    async fn record(&self, result: ComplianceCheckResult) -> Result<(), StoreError> {
        let mut results = self.results.write().await;
        results
            .entry(result.project_id.clone())
            .or_insert_with(Vec::new)
            .push(result);
        Ok(())
    }

    async fn latest_for(&self, project_id: &str) -> Result<Option<ComplianceCheckResult>, StoreError> {
        let results = self.results.read().await;
        Ok(results.get(project_id).and_then(|runs| runs.last().cloned()))
    }

    async fn history_for(&self, project_id: &str) -> Result<Vec<ComplianceCheckResult>, StoreError> {
        let results = self.results.read().await;
        Ok(results.get(project_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use registry_types::SubTestResult;

    fn result(id: &str, passed: bool) -> ComplianceCheckResult {
        let sub = if passed {
            SubTestResult::pass("Check GIS Integrity", 95)
        } else {
            SubTestResult::fail("Check GIS Integrity", 20, vec!["area mismatch".to_string()])
        };
        ComplianceCheckResult {
            id: id.to_string(),
            project_id: "NCCR-2024-001".to_string(),
            evidence_revision: 1,
            evidence_snapshot_at: None,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            sub_tests: vec![sub],
        }
    }

    #[tokio::test]
    async fn test_latest_is_last_recorded() {
        let store = InMemoryResultStore::new();
        assert!(store.latest_for("NCCR-2024-001").await.unwrap().is_none());

        store.record(result("r-1", false)).await.unwrap();
        store.record(result("r-2", true)).await.unwrap();

        let latest = store.latest_for("NCCR-2024-001").await.unwrap().unwrap();
        assert_eq!(latest.id, "r-2");

        let history = store.history_for("NCCR-2024-001").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "r-1");
        assert!(!history[0].passed());
    }
}
