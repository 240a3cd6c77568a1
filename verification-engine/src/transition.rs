//! Stage Transition Engine - the sole writer of project records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use registry_types::{
    ActorContext, ComplianceCheckResult, Evidence, EvidenceUpload, Priority, Result, Stage,
    StageHistoryEntry, WorkflowError,
};

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::clock::Clock;
use crate::compliance::ComplianceResultStore;
use crate::project::{NewProject, ProjectRecord};
use crate::store::{ProjectRepository, StoreError};

/// Commutative writes (evidence, priority) retry this often on a version race.
const MAX_WRITE_RETRIES: usize = 5;

/// Request to move a project to another stage.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    /// Project to move
    pub project_id: String,
    /// Stage to enter
    pub target: Stage,
    /// Who is asking
    pub actor: ActorContext,
    /// Reason recorded in the history
    pub reason: String,
    /// Version the caller based its decision on, if any.
    ///
    /// When unset, the request is validated against whatever version the
    /// engine reads and committed with a compare-and-swap on that version.
    /// Concurrent requests are serialized: a writer that loses the swap gets
    /// `ConcurrentModification` and nothing it validated is applied.
    pub observed_version: Option<u64>,
}

impl TransitionRequest {
    /// Create a request with a default reason and no observed version.
    pub fn new(project_id: impl Into<String>, target: Stage, actor: ActorContext) -> Self {
        Self {
            project_id: project_id.into(),
            target,
            actor,
            reason: format!("Moved to {}", target.label()),
            observed_version: None,
        }
    }

    /// Set the history reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Fail with `ConcurrentModification` unless the project is still at this version.
    pub fn observed(mut self, version: u64) -> Self {
        self.observed_version = Some(version);
        self
    }
}

/// Outcome of an accepted transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionReceipt {
    pub project_id: String,
    pub from: Stage,
    pub to: Stage,
    /// History entry appended by this transition
    pub entry: StageHistoryEntry,
    /// Project version after the commit
    pub version: u64,
}

/// Validates and applies stage transitions.
///
/// Every mutation follows read, validate, compare-and-swap commit, so a
/// transition is either fully visible or not at all, and two writers that
/// read the same version cannot both succeed.
pub struct StageTransitionEngine {
    repository: Arc<dyn ProjectRepository>,
    results: Arc<dyn ComplianceResultStore>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
}

impl StageTransitionEngine {
    pub fn new(
        repository: Arc<dyn ProjectRepository>,
        results: Arc<dyn ComplianceResultStore>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            results,
            audit,
            clock,
        }
    }

    /// Fetch a project.
    pub async fn project(&self, project_id: &str) -> Result<ProjectRecord> {
        Ok(self.repository.get(project_id).await?)
    }

    /// Register a newly submitted project at Panchayat Updates.
    pub async fn register(&self, project: NewProject, actor: &ActorContext) -> Result<ProjectRecord> {
        let now = self.clock.now();
        let record = ProjectRecord::new(project, actor, now)?;
        let record = self.repository.insert(record).await?;

        info!(project_id = %record.id(), actor = %actor.actor_id, "Project registered");
        self.audit
            .record(AuditEntry::accepted(record.id(), AuditAction::Submitted, actor, now))
            .await;
        Ok(record)
    }

    /// Register a project migrated from an existing registry at `stage`.
    pub async fn import(
        &self,
        project: NewProject,
        stage: Stage,
        actor: &ActorContext,
    ) -> Result<ProjectRecord> {
        let now = self.clock.now();
        let record = ProjectRecord::imported(project, stage, actor, now)?;
        let record = self.repository.insert(record).await?;

        info!(project_id = %record.id(), stage = %stage, "Project imported");
        self.audit
            .record(AuditEntry::accepted(
                record.id(),
                AuditAction::Imported { stage },
                actor,
                now,
            ))
            .await;
        Ok(record)
    }

    /// Validate and apply a stage transition.
    ///
    /// Without an observed version the stage the caller saw is not pinned,
    /// only the one read here. Use [`TransitionRequest::observed`] when the
    /// decision was made from an earlier read.
    pub async fn attempt_transition(&self, request: TransitionRequest) -> Result<TransitionReceipt> {
        self.transition_with(request, |_| {}).await
    }

    /// Apply the consequence of a compliance verdict.
    ///
    /// A passing verdict moves the project to Ready for Credits. A failing
    /// one routes it back to Panchayat Updates for remediation. Only the
    /// latest recorded result for the project applies, and only while the
    /// evidence it checked is still current.
    pub async fn apply_verdict(
        &self,
        result: &ComplianceCheckResult,
        actor: &ActorContext,
    ) -> Result<TransitionReceipt> {
        let project = self.repository.get(&result.project_id).await?;
        if project.stage() != Stage::ComplianceCheck {
            return Err(WorkflowError::PreconditionNotMet {
                project_id: result.project_id.clone(),
                reason: format!(
                    "verdicts apply only at {}, project is at {}",
                    Stage::ComplianceCheck,
                    project.stage()
                ),
            });
        }

        let latest = self.results.latest_for(&result.project_id).await?;
        if latest.as_ref().map(|r| r.id.as_str()) != Some(result.id.as_str()) {
            return Err(WorkflowError::PreconditionNotMet {
                project_id: result.project_id.clone(),
                reason: format!("result {} is not the latest recorded compliance check", result.id),
            });
        }
        if !result.is_current_for(project.evidence_revision()) {
            return Err(WorkflowError::StaleEvidence {
                project_id: result.project_id.clone(),
                snapshot_revision: result.evidence_revision,
                current_revision: project.evidence_revision(),
            });
        }

        if result.passed() {
            let request = TransitionRequest::new(&result.project_id, Stage::ReadyForCredits, actor.clone())
                .with_reason(format!(
                    "Compliance battery passed with score {} (result {})",
                    result.overall_score(),
                    result.id
                ))
                .observed(project.version());
            self.attempt_transition(request).await
        } else {
            let request = TransitionRequest::new(&result.project_id, Stage::PanchayatUpdates, actor.clone())
                .with_reason(format!(
                    "Compliance failed: {} (result {})",
                    result.failed_checks().join(", "),
                    result.id
                ))
                .observed(project.version());
            self.transition_with(request, ProjectRecord::note_compliance_failure)
                .await
        }
    }

    /// Record an evidence upload. Refused once a project is closed.
    pub async fn record_evidence(
        &self,
        project_id: &str,
        upload: EvidenceUpload,
        actor: &ActorContext,
    ) -> Result<Evidence> {
        let evidence = Evidence {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            kind: upload.kind,
            uploaded_at: upload.uploaded_at,
            recorded_at: self.clock.now(),
            submitted_by: actor.actor_id.clone(),
            metadata: upload.metadata,
        };

        let committed = self
            .update_with_retry(project_id, |project, now| {
                if project.stage().is_terminal() {
                    return Err(WorkflowError::PreconditionNotMet {
                        project_id: project_id.to_string(),
                        reason: format!("project is closed at {}", project.stage()),
                    });
                }
                project.record_evidence(evidence.clone(), now);
                Ok(())
            })
            .await?;

        debug!(
            project_id = %project_id,
            kind = ?evidence.kind,
            revision = committed.evidence_revision(),
            "Evidence recorded"
        );
        self.audit
            .record(AuditEntry::accepted(
                project_id,
                AuditAction::EvidenceRecorded {
                    kind: evidence.kind,
                    revision: committed.evidence_revision(),
                },
                actor,
                committed.updated_at(),
            ))
            .await;
        Ok(evidence)
    }

    /// Store the certificate returned by the issuance service.
    pub async fn attach_certificate(
        &self,
        project_id: &str,
        certificate_id: &str,
        actor: &ActorContext,
    ) -> Result<ProjectRecord> {
        let committed = self
            .update_with_retry(project_id, |project, now| {
                if project.stage() != Stage::CreditsGenerated {
                    return Err(WorkflowError::PreconditionNotMet {
                        project_id: project_id.to_string(),
                        reason: format!(
                            "certificates attach only at {}, project is at {}",
                            Stage::CreditsGenerated,
                            project.stage()
                        ),
                    });
                }
                if let Some(existing) = project.certificate_id() {
                    return Err(WorkflowError::PreconditionNotMet {
                        project_id: project_id.to_string(),
                        reason: format!("certificate {existing} is already attached"),
                    });
                }
                project.attach_certificate(certificate_id.to_string(), now);
                Ok(())
            })
            .await?;

        info!(project_id = %project_id, certificate_id = %certificate_id, "Certificate attached");
        self.audit
            .record(AuditEntry::accepted(
                project_id,
                AuditAction::CertificateAttached {
                    certificate_id: certificate_id.to_string(),
                },
                actor,
                committed.updated_at(),
            ))
            .await;
        Ok(committed)
    }

    /// Change editorial priority.
    pub async fn set_priority(
        &self,
        project_id: &str,
        priority: Priority,
        actor: &ActorContext,
    ) -> Result<ProjectRecord> {
        let committed = self
            .update_with_retry(project_id, |project, now| {
                project.set_priority(priority, now);
                Ok(())
            })
            .await?;

        self.audit
            .record(AuditEntry::accepted(
                project_id,
                AuditAction::PriorityChanged { priority },
                actor,
                committed.updated_at(),
            ))
            .await;
        Ok(committed)
    }

    /// Whether the compliance gate on Ready for Credits is satisfied.
    pub async fn ensure_compliance_cleared(&self, project: &ProjectRecord) -> Result<()> {
        let not_met = |reason: String| WorkflowError::PreconditionNotMet {
            project_id: project.id().to_string(),
            reason,
        };

        let latest = self.results.latest_for(project.id()).await?;
        match latest {
            None => Err(not_met("no compliance check has been recorded".to_string())),
            Some(result) if !result.passed() => Err(not_met(format!(
                "latest compliance check failed: {}",
                result.failed_checks().join(", ")
            ))),
            Some(result) if !result.is_current_for(project.evidence_revision()) => {
                Err(not_met(format!(
                    "evidence changed after the latest compliance check (checked revision {}, now {})",
                    result.evidence_revision,
                    project.evidence_revision()
                )))
            }
            Some(_) => Ok(()),
        }
    }

    async fn transition_with<F>(&self, request: TransitionRequest, mutate: F) -> Result<TransitionReceipt>
    where
        F: FnOnce(&mut ProjectRecord),
    {
        let current = self.repository.get(&request.project_id).await?;
        let from = current.stage();
        let now = self.clock.now();

        if let Err(err) = self.validate(&current, &request).await {
            self.reject(&request, from, now, &err).await;
            return Err(err);
        }

        let mut next = current.clone();
        let entry = next.apply_transition(request.target, &request.actor, request.reason.clone(), now);
        if request.target == Stage::CreditsGenerated {
            next.finalize_credits();
        }
        mutate(&mut next);

        let committed = match self.repository.commit(next, current.version()).await {
            Ok(committed) => committed,
            Err(err) => {
                let err = WorkflowError::from(err);
                self.reject(&request, from, now, &err).await;
                return Err(err);
            }
        };

        info!(
            project_id = %request.project_id,
            from = %from,
            to = %request.target,
            actor = %request.actor.actor_id,
            version = committed.version(),
            "Stage transition applied"
        );
        self.audit
            .record(AuditEntry::accepted(
                &request.project_id,
                AuditAction::Transition {
                    from,
                    to: request.target,
                },
                &request.actor,
                entry.at,
            ))
            .await;

        Ok(TransitionReceipt {
            project_id: request.project_id,
            from,
            to: request.target,
            entry,
            version: committed.version(),
        })
    }

    async fn validate(&self, current: &ProjectRecord, request: &TransitionRequest) -> Result<()> {
        if let Some(observed) = request.observed_version {
            if observed != current.version() {
                return Err(WorkflowError::ConcurrentModification {
                    project_id: request.project_id.clone(),
                    expected: observed,
                    actual: current.version(),
                });
            }
        }

        if !current.stage().can_transition_to(request.target) {
            return Err(WorkflowError::InvalidTransition {
                project_id: request.project_id.clone(),
                from: current.stage(),
                to: request.target,
            });
        }

        if request.target == Stage::ReadyForCredits {
            self.ensure_compliance_cleared(current).await?;
        }
        Ok(())
    }

    async fn reject(&self, request: &TransitionRequest, from: Stage, at: DateTime<Utc>, err: &WorkflowError) {
        warn!(
            project_id = %request.project_id,
            from = %from,
            to = %request.target,
            kind = ?err.kind(),
            "Stage transition rejected"
        );
        self.audit
            .record(AuditEntry::rejected(
                &request.project_id,
                AuditAction::Transition {
                    from,
                    to: request.target,
                },
                &request.actor,
                at,
                err.rejection(),
            ))
            .await;
    }

    /// Read-modify-commit for writes that do not depend on the stage history.
    async fn update_with_retry<F>(&self, project_id: &str, mut mutate: F) -> Result<ProjectRecord>
    where
        F: FnMut(&mut ProjectRecord, DateTime<Utc>) -> Result<()>,
    {
        let mut attempt = 0;
        loop {
            let current = self.repository.get(project_id).await?;
            let mut next = current.clone();
            mutate(&mut next, self.clock.now())?;

            match self.repository.commit(next, current.version()).await {
                Ok(committed) => return Ok(committed),
                Err(StoreError::VersionConflict { .. }) if attempt + 1 < MAX_WRITE_RETRIES => {
                    attempt += 1;
                    debug!(project_id = %project_id, attempt, "Retrying write after version race");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
