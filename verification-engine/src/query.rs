//! Queue Query/Filter Service - read-only projections for the verification queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use registry_types::{EcosystemType, Priority, Result, Stage, StageFilter};

use crate::project::ProjectRecord;
use crate::store::ProjectRepository;

/// Row shown in the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub ecosystem: EcosystemType,
    pub panchayat: String,
    pub ngo_partner: String,
    pub stage: Stage,
    pub priority: Priority,
    pub hectares_restored: f64,
    pub estimated_credits: u64,
    pub generated_credits: Option<u64>,
    pub evidence_count: usize,
    pub compliance_failures: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProjectRecord> for ProjectSummary {
    fn from(p: &ProjectRecord) -> Self {
        Self {
            id: p.id().to_string(),
            title: p.title().to_string(),
            ecosystem: p.ecosystem(),
            panchayat: p.panchayat().to_string(),
            ngo_partner: p.ngo_partner().to_string(),
            stage: p.stage(),
            priority: p.priority(),
            hectares_restored: p.hectares_restored(),
            estimated_credits: p.estimated_credits(),
            generated_credits: p.generated_credits(),
            evidence_count: p.evidence().len(),
            compliance_failures: p.compliance_failures(),
            updated_at: p.updated_at(),
        }
    }
}

/// Sort order for queue views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueSort {
    /// Project ID ascending
    #[default]
    IdAsc,
    /// Most recently updated first
    UpdatedDesc,
    /// High priority first, then ID
    PriorityDesc,
    /// Largest estimated credits first
    CreditsDesc,
}

/// Combined filter for the queue list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueQuery {
    pub stage: StageFilter,
    pub priority: Option<Priority>,
    /// Free-text search term
    pub term: Option<String>,
    pub sort: QueueSort,
    pub limit: Option<usize>,
}

impl QueueQuery {
    pub fn stage(mut self, filter: impl Into<StageFilter>) -> Self {
        self.stage = filter.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn sort(mut self, sort: QueueSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Per-stage project counts taken from a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub counts: BTreeMap<Stage, usize>,
    pub total: usize,
}

impl StageCounts {
    pub fn get(&self, stage: Stage) -> usize {
        self.counts.get(&stage).copied().unwrap_or(0)
    }
}

/// Read-only views over the project store. Never mutates.
pub struct QueueQueryService {
    repository: Arc<dyn ProjectRepository>,
}

impl QueueQueryService {
    pub fn new(repository: Arc<dyn ProjectRepository>) -> Self {
        Self { repository }
    }

    /// Projects at a stage, or all projects.
    pub async fn list_by_stage(&self, filter: impl Into<StageFilter>) -> Result<Vec<ProjectSummary>> {
        self.query(&QueueQuery::default().stage(filter)).await
    }

    /// Case-insensitive search over ID, title, Panchayat, NGO and ecosystem.
    /// A blank term matches everything.
    pub async fn search(&self, term: &str) -> Result<Vec<ProjectSummary>> {
        self.query(&QueueQuery::default().term(term)).await
    }

    /// Number of projects at every stage, zeros included.
    pub async fn counts_by_stage(&self) -> Result<StageCounts> {
        let snapshot = self.repository.snapshot().await?;
        let mut counts: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
        for project in &snapshot {
            *counts.entry(project.stage()).or_insert(0) += 1;
        }
        Ok(StageCounts {
            counts,
            total: snapshot.len(),
        })
    }

    /// Filter, sort and limit in one pass over one snapshot.
    pub async fn query(&self, query: &QueueQuery) -> Result<Vec<ProjectSummary>> {
        let snapshot = self.repository.snapshot().await?;
        let needle = query
            .term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<ProjectSummary> = snapshot
            .iter()
            .filter(|p| query.stage.matches(p.stage()))
            .filter(|p| query.priority.map_or(true, |prio| p.priority() == prio))
            .filter(|p| needle.as_deref().map_or(true, |n| matches_term(p, n)))
            .map(ProjectSummary::from)
            .collect();

        match query.sort {
            QueueSort::IdAsc => rows.sort_by(|a, b| a.id.cmp(&b.id)),
            QueueSort::UpdatedDesc => {
                rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)))
            }
            QueueSort::PriorityDesc => {
                rows.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)))
            }
            QueueSort::CreditsDesc => rows.sort_by(|a, b| {
                b.estimated_credits
                    .cmp(&a.estimated_credits)
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

fn matches_term(project: &ProjectRecord, needle: &str) -> bool {
    [
        project.id(),
        project.title(),
        project.panchayat(),
        project.ngo_partner(),
        project.ecosystem().label(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::NewProject;
    use crate::store::InMemoryProjectStore;
    use registry_types::ActorContext;

    async fn seeded() -> QueueQueryService {
        let store = Arc::new(InMemoryProjectStore::new());
        let rows = [
            ("NCCR-2024-001", "Sundarbans Mangrove Belt", EcosystemType::Mangrove, "Gosaba", Priority::High, Stage::ComplianceCheck, 2_450),
            ("NCCR-2024-002", "Palk Bay Seagrass Meadows", EcosystemType::Seagrass, "Mandapam", Priority::Medium, Stage::ExpertReview, 1_200),
            ("NCCR-2024-003", "Chilika Lagoon Salt Marsh", EcosystemType::SaltMarsh, "Satapada", Priority::Low, Stage::ComplianceCheck, 800),
            ("NCCR-2024-004", "Gulf of Mannar Reef Revival", EcosystemType::CoralReef, "Rameswaram", Priority::High, Stage::PanchayatUpdates, 3_100),
        ];
        for (id, title, ecosystem, panchayat, priority, stage, credits) in rows {
            let project = NewProject {
                id: id.to_string(),
                title: title.to_string(),
                ecosystem,
                panchayat: format!("{panchayat} Gram Panchayat"),
                ngo_partner: "Coastal Green Trust".to_string(),
                hectares_restored: 50.0,
                estimated_credits: credits,
                priority,
            };
            let record = ProjectRecord::imported(project, stage, &ActorContext::system(), Utc::now()).unwrap();
            store.insert(record).await.unwrap();
        }
        QueueQueryService::new(store)
    }

    #[tokio::test]
    async fn test_list_by_stage() {
        let queue = seeded().await;
        let rows = queue.list_by_stage(Stage::ComplianceCheck).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["NCCR-2024-001", "NCCR-2024-003"]);

        assert_eq!(queue.list_by_stage(StageFilter::All).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let queue = seeded().await;
        assert_eq!(queue.search("seagrass").await.unwrap()[0].id, "NCCR-2024-002");
        assert_eq!(queue.search("RAMESWARAM").await.unwrap()[0].id, "NCCR-2024-004");
        assert_eq!(queue.search("salt marsh").await.unwrap().len(), 1);
        assert_eq!(queue.search("  ").await.unwrap().len(), 4);
        assert!(queue.search("kerala").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_include_empty_stages() {
        let queue = seeded().await;
        let counts = queue.counts_by_stage().await.unwrap();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.get(Stage::ComplianceCheck), 2);
        assert_eq!(counts.get(Stage::Rejected), 0);
        assert_eq!(counts.counts.len(), Stage::ALL.len());

        assert_eq!(counts, queue.counts_by_stage().await.unwrap());
    }

    #[tokio::test]
    async fn test_combined_query() {
        let queue = seeded().await;
        let rows = queue
            .query(
                &QueueQuery::default()
                    .priority(Priority::High)
                    .sort(QueueSort::CreditsDesc)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "NCCR-2024-004");
    }
}
