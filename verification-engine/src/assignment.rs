//! Expert assignments.
//!
//! Experts come from an external directory. Assignment status only moves
//! forward, one step at a time: Assigned, In Progress, Report Uploaded,
//! Completed.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use registry_types::{
    ActorContext, AssignmentStatus, Availability, Evidence, EvidenceKind, EvidenceUpload, Expert,
    ExpertAssignment, Result, WorkflowError,
};

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::clock::Clock;
use crate::transition::StageTransitionEngine;

/// External source of expert records.
#[async_trait]
pub trait ExpertDirectory: Send + Sync {
    /// Look up an expert.
    async fn get_expert(&self, expert_id: &str) -> Option<Expert>;
}

/// In-memory expert directory.
#[derive(Default)]
pub struct InMemoryExpertDirectory {
    experts: DashMap<String, Expert>,
}

impl InMemoryExpertDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an expert.
    pub fn upsert(&self, expert: Expert) {
        self.experts.insert(expert.id.clone(), expert);
    }

    pub fn set_availability(&self, expert_id: &str, availability: Availability) {
        if let Some(mut expert) = self.experts.get_mut(expert_id) {
            expert.availability = availability;
        }
    }
}

#[async_trait]
impl ExpertDirectory for InMemoryExpertDirectory {
    async fn get_expert(&self, expert_id: &str) -> Option<Expert> {
        self.experts.get(expert_id).map(|e| e.clone())
    }
}

/// Manages expert assignments for projects.
///
/// Status changes are made under the assignment's map entry, so two callers
/// can never both take the same step.
pub struct ExpertAssignmentService {
    directory: Arc<dyn ExpertDirectory>,
    engine: Arc<StageTransitionEngine>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    assignments: DashMap<String, ExpertAssignment>,
    /// Open assignment per (project, expert)
    active: DashMap<(String, String), String>,
}

impl ExpertAssignmentService {
    pub fn new(
        directory: Arc<dyn ExpertDirectory>,
        engine: Arc<StageTransitionEngine>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            engine,
            audit,
            clock,
            assignments: DashMap::new(),
            active: DashMap::new(),
        }
    }

    /// Assign an available expert to an open project.
    pub async fn assign(
        &self,
        project_id: &str,
        expert_id: &str,
        actor: &ActorContext,
    ) -> Result<ExpertAssignment> {
        let project = self.engine.project(project_id).await?;
        if project.stage().is_terminal() {
            return Err(WorkflowError::PreconditionNotMet {
                project_id: project_id.to_string(),
                reason: format!("project is closed at {}", project.stage()),
            });
        }

        let expert = self
            .directory
            .get_expert(expert_id)
            .await
            .ok_or_else(|| WorkflowError::ExpertNotFound(expert_id.to_string()))?;
        if expert.availability != Availability::Available {
            return Err(WorkflowError::ExpertUnavailable(expert_id.to_string()));
        }

        let now = self.clock.now();
        let assignment = ExpertAssignment {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            expert_id: expert_id.to_string(),
            status: AssignmentStatus::Assigned,
            assigned_by: actor.actor_id.clone(),
            assigned_at: now,
            updated_at: now,
            status_history: vec![(AssignmentStatus::Assigned, now)],
        };

        match self.active.entry((project_id.to_string(), expert_id.to_string())) {
            Entry::Occupied(_) => {
                return Err(WorkflowError::PreconditionNotMet {
                    project_id: project_id.to_string(),
                    reason: format!("{} is already assigned to this project", expert.name),
                });
            }
            Entry::Vacant(slot) => {
                self.assignments.insert(assignment.id.clone(), assignment.clone());
                slot.insert(assignment.id.clone());
            }
        }

        info!(
            assignment_id = %assignment.id,
            project_id = %project_id,
            expert_id = %expert_id,
            "Expert assigned"
        );
        self.log(&assignment, actor).await;
        Ok(assignment)
    }

    /// Move an assignment exactly one step forward.
    pub async fn advance(
        &self,
        assignment_id: &str,
        to: AssignmentStatus,
        actor: &ActorContext,
    ) -> Result<ExpertAssignment> {
        let (_, updated) = self.step(assignment_id, to)?;
        info!(assignment_id = %assignment_id, status = %to, "Assignment advanced");
        self.log(&updated, actor).await;
        Ok(updated)
    }

    /// Record the expert's report as project evidence and mark it uploaded.
    ///
    /// The assignment is moved to Report Uploaded before the evidence is
    /// written, so concurrent uploads record at most one report. If the
    /// evidence write fails the assignment goes back to In Progress.
    pub async fn upload_report(
        &self,
        assignment_id: &str,
        report: EvidenceUpload,
        actor: &ActorContext,
    ) -> Result<(ExpertAssignment, Evidence)> {
        let (before, claimed) = self.step(assignment_id, AssignmentStatus::ReportUploaded)?;

        let report = EvidenceUpload {
            kind: EvidenceKind::ExpertReport,
            ..report
        };
        match self
            .engine
            .record_evidence(&claimed.project_id, report, actor)
            .await
        {
            Ok(evidence) => {
                info!(assignment_id = %assignment_id, evidence_id = %evidence.id, "Expert report uploaded");
                self.log(&claimed, actor).await;
                Ok((claimed, evidence))
            }
            Err(err) => {
                self.restore(before);
                Err(err)
            }
        }
    }

    pub fn get(&self, assignment_id: &str) -> Result<ExpertAssignment> {
        self.assignments
            .get(assignment_id)
            .map(|a| a.clone())
            .ok_or_else(|| WorkflowError::AssignmentNotFound(assignment_id.to_string()))
    }

    /// Assignments for a project, oldest first.
    pub fn for_project(&self, project_id: &str) -> Vec<ExpertAssignment> {
        let mut found: Vec<ExpertAssignment> = self
            .assignments
            .iter()
            .filter(|a| a.project_id == project_id)
            .map(|a| a.clone())
            .collect();
        found.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at).then_with(|| a.id.cmp(&b.id)));
        found
    }

    /// Take one forward step under the entry lock. Returns the record as it
    /// was before the step and as it is after.
    fn step(
        &self,
        assignment_id: &str,
        to: AssignmentStatus,
    ) -> Result<(ExpertAssignment, ExpertAssignment)> {
        let (before, after) = {
            let mut entry = self
                .assignments
                .get_mut(assignment_id)
                .ok_or_else(|| WorkflowError::AssignmentNotFound(assignment_id.to_string()))?;

            if entry.status.next() != Some(to) {
                return Err(WorkflowError::InvalidAssignmentTransition {
                    assignment_id: assignment_id.to_string(),
                    from: entry.status,
                    to,
                });
            }

            let before = entry.clone();
            let now = self.clock.now().max(entry.updated_at);
            entry.status = to;
            entry.updated_at = now;
            entry.status_history.push((to, now));
            (before, entry.clone())
        };

        // Entry guard is released before touching the active index
        if to == AssignmentStatus::Completed {
            self.active
                .remove_if(&(after.project_id.clone(), after.expert_id.clone()), |_, id| {
                    *id == after.id
                });
        }
        Ok((before, after))
    }

    /// Undo a claimed step, unless someone has moved the assignment since.
    fn restore(&self, before: ExpertAssignment) {
        let Some(mut entry) = self.assignments.get_mut(&before.id) else {
            return;
        };
        if entry.status_history.len() == before.status_history.len() + 1
            && before.status.next() == Some(entry.status)
        {
            *entry = before;
        } else {
            warn!(
                assignment_id = %before.id,
                status = %entry.status,
                "Assignment moved on before a failed step could be undone"
            );
        }
    }

    async fn log(&self, assignment: &ExpertAssignment, actor: &ActorContext) {
        self.audit
            .record(AuditEntry::accepted(
                &assignment.project_id,
                AuditAction::AssignmentChanged {
                    assignment_id: assignment.id.clone(),
                    status: assignment.status,
                },
                actor,
                assignment.updated_at,
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::compliance::InMemoryResultStore;
    use crate::project::tests::sample_project;
    use crate::store::InMemoryProjectStore;
    use chrono::Utc;
    use registry_types::{ActorRole, Stage};

    async fn service() -> (ExpertAssignmentService, Arc<InMemoryExpertDirectory>) {
        let audit = Arc::new(AuditLog::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let engine = Arc::new(StageTransitionEngine::new(
            Arc::new(InMemoryProjectStore::new()),
            Arc::new(InMemoryResultStore::new()),
            audit.clone(),
            clock.clone(),
        ));
        let admin = ActorContext::new("admin", ActorRole::Administrator);
        engine
            .import(sample_project("NCCR-2024-001"), Stage::ExpertReview, &admin)
            .await
            .unwrap();
        engine
            .import(sample_project("NCCR-2023-090"), Stage::Rejected, &admin)
            .await
            .unwrap();

        let directory = Arc::new(InMemoryExpertDirectory::new());
        directory.upsert(Expert {
            id: "exp-1".to_string(),
            name: "Dr. Meera Nair".to_string(),
            role: "Marine Biologist".to_string(),
            specialization: "Mangrove carbon stock".to_string(),
            availability: Availability::Available,
        });
        directory.upsert(Expert {
            id: "exp-2".to_string(),
            name: "Arjun Rao".to_string(),
            role: "GIS Analyst".to_string(),
            specialization: "Remote sensing".to_string(),
            availability: Availability::OnLeave,
        });

        (
            ExpertAssignmentService::new(directory.clone(), engine, audit, clock),
            directory,
        )
    }

    fn admin() -> ActorContext {
        ActorContext::new("admin", ActorRole::Administrator)
    }

    #[tokio::test]
    async fn test_assignment_lifecycle() {
        let (service, _) = service().await;
        let assignment = service.assign("NCCR-2024-001", "exp-1", &admin()).await.unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Assigned);

        service
            .advance(&assignment.id, AssignmentStatus::InProgress, &admin())
            .await
            .unwrap();

        let expert = ActorContext::new("exp-1", ActorRole::Expert);
        let report = EvidenceUpload::new(EvidenceKind::Document, Utc::now())
            .with_meta("recommendation", "approve");
        let (updated, evidence) = service.upload_report(&assignment.id, report, &expert).await.unwrap();
        assert_eq!(updated.status, AssignmentStatus::ReportUploaded);
        assert_eq!(evidence.kind, EvidenceKind::ExpertReport);

        let done = service
            .advance(&assignment.id, AssignmentStatus::Completed, &admin())
            .await
            .unwrap();
        assert_eq!(done.status_history.len(), 4);
    }

    #[tokio::test]
    async fn test_no_backward_or_skipping_moves() {
        let (service, _) = service().await;
        let assignment = service.assign("NCCR-2024-001", "exp-1", &admin()).await.unwrap();

        let err = service
            .advance(&assignment.id, AssignmentStatus::Completed, &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidAssignmentTransition { .. }));

        service
            .advance(&assignment.id, AssignmentStatus::InProgress, &admin())
            .await
            .unwrap();
        assert!(service
            .advance(&assignment.id, AssignmentStatus::Assigned, &admin())
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_report_uploads_record_one_report() {
        for round in 0..20 {
            let (service, _) = service().await;
            let service = Arc::new(service);
            let assignment = service.assign("NCCR-2024-001", "exp-1", &admin()).await.unwrap();
            service
                .advance(&assignment.id, AssignmentStatus::InProgress, &admin())
                .await
                .unwrap();

            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let service = service.clone();
                    let id = assignment.id.clone();
                    tokio::spawn(async move {
                        let expert = ActorContext::new("exp-1", ActorRole::Expert);
                        let report = EvidenceUpload::new(EvidenceKind::Document, Utc::now())
                            .with_meta("draft", i);
                        service.upload_report(&id, report, &expert).await
                    })
                })
                .collect();

            let mut uploaded = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => uploaded += 1,
                    Err(err) => assert!(
                        matches!(err, WorkflowError::InvalidAssignmentTransition { .. }),
                        "round {round}: {err}"
                    ),
                }
            }
            assert_eq!(uploaded, 1, "round {round}");

            let project = service.engine.project("NCCR-2024-001").await.unwrap();
            assert_eq!(project.evidence().len(), 1, "round {round}");
            let current = service.get(&assignment.id).unwrap();
            assert_eq!(current.status, AssignmentStatus::ReportUploaded);
            assert_eq!(current.status_history.len(), 3);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_assign_creates_one_open_assignment() {
        let (service, _) = service().await;
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.assign("NCCR-2024-001", "exp-1", &admin()).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(service.for_project("NCCR-2024-001").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_report_upload_returns_to_in_progress() {
        let (service, _) = service().await;
        let assignment = service.assign("NCCR-2024-001", "exp-1", &admin()).await.unwrap();
        service
            .advance(&assignment.id, AssignmentStatus::InProgress, &admin())
            .await
            .unwrap();
        service
            .engine
            .attempt_transition(crate::transition::TransitionRequest::new(
                "NCCR-2024-001",
                Stage::Rejected,
                admin(),
            ))
            .await
            .unwrap();

        let expert = ActorContext::new("exp-1", ActorRole::Expert);
        let report = EvidenceUpload::new(EvidenceKind::Document, Utc::now());
        let err = service
            .upload_report(&assignment.id, report, &expert)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));

        let current = service.get(&assignment.id).unwrap();
        assert_eq!(current.status, AssignmentStatus::InProgress);
        assert_eq!(current.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_completed_assignment_frees_the_pair() {
        let (service, _) = service().await;
        let first = service.assign("NCCR-2024-001", "exp-1", &admin()).await.unwrap();
        for to in [
            AssignmentStatus::InProgress,
            AssignmentStatus::ReportUploaded,
            AssignmentStatus::Completed,
        ] {
            service.advance(&first.id, to, &admin()).await.unwrap();
        }

        let second = service.assign("NCCR-2024-001", "exp-1", &admin()).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(service.assign("NCCR-2024-001", "exp-1", &admin()).await.is_err());
    }

    #[tokio::test]
    async fn test_assignment_preconditions() {
        let (service, directory) = service().await;

        assert!(matches!(
            service.assign("NCCR-2024-001", "exp-2", &admin()).await,
            Err(WorkflowError::ExpertUnavailable(_))
        ));
        assert!(matches!(
            service.assign("NCCR-2024-001", "exp-9", &admin()).await,
            Err(WorkflowError::ExpertNotFound(_))
        ));
        assert!(matches!(
            service.assign("NCCR-2023-090", "exp-1", &admin()).await,
            Err(WorkflowError::PreconditionNotMet { .. })
        ));

        service.assign("NCCR-2024-001", "exp-1", &admin()).await.unwrap();
        assert!(service.assign("NCCR-2024-001", "exp-1", &admin()).await.is_err());

        directory.set_availability("exp-2", Availability::Available);
        service.assign("NCCR-2024-001", "exp-2", &admin()).await.unwrap();
        assert_eq!(service.for_project("NCCR-2024-001").len(), 2);
    }
}
