//! Project aggregate.
//!
//! A [`ProjectRecord`] can only be mutated inside this crate, and only the
//! transition engine does so. Stage history is append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use registry_types::{
    ActorContext, EcosystemType, Evidence, Priority, Result, Stage, StageHistoryEntry,
    WorkflowError,
};

/// Data supplied when a project is first submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    /// Stable external ID, e.g. "NCCR-2024-001"
    pub id: String,
    /// Project title
    pub title: String,
    /// Ecosystem being restored
    pub ecosystem: EcosystemType,
    /// Implementing Panchayat
    pub panchayat: String,
    /// Partner NGO
    pub ngo_partner: String,
    /// Area restored (hectares, positive)
    pub hectares_restored: f64,
    /// Estimated credits (tCO2e)
    pub estimated_credits: u64,
    /// Editorial priority
    #[serde(default)]
    pub priority: Priority,
}

impl NewProject {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(WorkflowError::InvalidProject("project id is empty".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(WorkflowError::InvalidProject(format!(
                "project {} has no title",
                self.id
            )));
        }
        if !self.hectares_restored.is_finite() || self.hectares_restored <= 0.0 {
            return Err(WorkflowError::InvalidProject(format!(
                "project {} must restore a positive area, got {} ha",
                self.id, self.hectares_restored
            )));
        }
        Ok(())
    }
}

/// A project in the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectRecord {
    id: String,
    title: String,
    ecosystem: EcosystemType,
    panchayat: String,
    ngo_partner: String,
    stage: Stage,
    history: Vec<StageHistoryEntry>,
    hectares_restored: f64,
    estimated_credits: u64,
    generated_credits: Option<u64>,
    priority: Priority,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    evidence: Vec<Evidence>,
    evidence_revision: u64,
    evidence_updated_at: Option<DateTime<Utc>>,
    compliance_failures: u32,
    certificate_id: Option<String>,
    version: u64,
}

impl ProjectRecord {
    /// A freshly submitted project at Panchayat Updates.
    pub(crate) fn new(project: NewProject, actor: &ActorContext, at: DateTime<Utc>) -> Result<Self> {
        Self::starting_at(project, Stage::PanchayatUpdates, actor, at, "Project submitted")
    }

    /// A project migrated from an existing registry, already mid-pipeline.
    ///
    /// Imports at Ready for Credits or Credits Generated are refused: both
    /// stages require a passing compliance result recorded by this registry.
    pub(crate) fn imported(
        project: NewProject,
        stage: Stage,
        actor: &ActorContext,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        if matches!(stage, Stage::ReadyForCredits | Stage::CreditsGenerated) {
            return Err(WorkflowError::InvalidProject(format!(
                "project {} cannot be imported at {}; it must pass compliance here first",
                project.id, stage
            )));
        }
        let reason = format!("Imported at {}", stage.label());
        Self::starting_at(project, stage, actor, at, &reason)
    }

    fn starting_at(
        project: NewProject,
        stage: Stage,
        actor: &ActorContext,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Self> {
        project.validate()?;
        let entry = StageHistoryEntry {
            sequence: 0,
            from: None,
            to: stage,
            actor_id: actor.actor_id.clone(),
            role: actor.role,
            at,
            reason: reason.to_string(),
        };
        Ok(Self {
            id: project.id,
            title: project.title,
            ecosystem: project.ecosystem,
            panchayat: project.panchayat,
            ngo_partner: project.ngo_partner,
            stage,
            history: vec![entry],
            hectares_restored: project.hectares_restored,
            estimated_credits: project.estimated_credits,
            generated_credits: None,
            priority: project.priority,
            created_at: at,
            updated_at: at,
            evidence: Vec::new(),
            evidence_revision: 0,
            evidence_updated_at: None,
            compliance_failures: 0,
            certificate_id: None,
            version: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn ecosystem(&self) -> EcosystemType {
        self.ecosystem
    }

    pub fn panchayat(&self) -> &str {
        &self.panchayat
    }

    pub fn ngo_partner(&self) -> &str {
        &self.ngo_partner
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stage history, oldest first.
    pub fn history(&self) -> &[StageHistoryEntry] {
        &self.history
    }

    pub fn hectares_restored(&self) -> f64 {
        self.hectares_restored
    }

    pub fn estimated_credits(&self) -> u64 {
        self.estimated_credits
    }

    /// Finalized credits; `None` until Credits Generated.
    pub fn generated_credits(&self) -> Option<u64> {
        self.generated_credits
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    /// Bumped on every evidence upload.
    pub fn evidence_revision(&self) -> u64 {
        self.evidence_revision
    }

    pub fn evidence_updated_at(&self) -> Option<DateTime<Utc>> {
        self.evidence_updated_at
    }

    /// Failed compliance verdicts routed back to remediation.
    pub fn compliance_failures(&self) -> u32 {
        self.compliance_failures
    }

    pub fn certificate_id(&self) -> Option<&str> {
        self.certificate_id.as_deref()
    }

    /// Optimistic concurrency token.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Move to `to` and append the history entry. Adjacency is checked by the engine.
    pub(crate) fn apply_transition(
        &mut self,
        to: Stage,
        actor: &ActorContext,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> StageHistoryEntry {
        let at = self.touch(at);
        let entry = StageHistoryEntry {
            sequence: self.history.len() as u64,
            from: Some(self.stage),
            to,
            actor_id: actor.actor_id.clone(),
            role: actor.role,
            at,
            reason: reason.into(),
        };
        self.history.push(entry.clone());
        self.stage = to;
        entry
    }

    pub(crate) fn record_evidence(&mut self, evidence: Evidence, at: DateTime<Utc>) {
        let at = self.touch(at);
        self.evidence.push(evidence);
        self.evidence_revision += 1;
        self.evidence_updated_at = Some(at);
    }

    /// Estimated credits become generated credits.
    pub(crate) fn finalize_credits(&mut self) {
        self.generated_credits = Some(self.estimated_credits);
    }

    pub(crate) fn note_compliance_failure(&mut self) {
        self.compliance_failures += 1;
    }

    pub(crate) fn attach_certificate(&mut self, certificate_id: String, at: DateTime<Utc>) {
        self.touch(at);
        self.certificate_id = Some(certificate_id);
    }

    pub(crate) fn set_priority(&mut self, priority: Priority, at: DateTime<Utc>) {
        self.touch(at);
        self.priority = priority;
    }

    /// Advance `updated_at`, never backwards. Returns the effective timestamp.
    fn touch(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        if at > self.updated_at {
            self.updated_at = at;
        }
        self.updated_at
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use registry_types::{ActorRole, EvidenceKind};
    use std::collections::HashMap;

    pub(crate) fn sample_project(id: &str) -> NewProject {
        NewProject {
            id: id.to_string(),
            title: "Sundarbans Mangrove Restoration".to_string(),
            ecosystem: EcosystemType::Mangrove,
            panchayat: "Gosaba Gram Panchayat".to_string(),
            ngo_partner: "Coastal Green Trust".to_string(),
            hectares_restored: 125.5,
            estimated_credits: 2_450,
            priority: Priority::High,
        }
    }

    fn actor() -> ActorContext {
        ActorContext::new("officer-7", ActorRole::PanchayatOfficer)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_new_project_starts_with_creation_entry() {
        let project = ProjectRecord::new(sample_project("NCCR-2024-001"), &actor(), t0()).unwrap();
        assert_eq!(project.stage(), Stage::PanchayatUpdates);
        assert_eq!(project.history().len(), 1);
        assert_eq!(project.history()[0].from, None);
        assert_eq!(project.generated_credits(), None);
        assert_eq!(project.version(), 0);
    }

    #[test]
    fn test_rejects_non_positive_area() {
        let mut data = sample_project("NCCR-2024-002");
        data.hectares_restored = 0.0;
        assert!(matches!(
            ProjectRecord::new(data, &actor(), t0()),
            Err(WorkflowError::InvalidProject(_))
        ));

        let mut data = sample_project("NCCR-2024-002");
        data.hectares_restored = f64::NAN;
        assert!(ProjectRecord::new(data, &actor(), t0()).is_err());
    }

    #[test]
    fn test_updated_at_never_goes_backwards() {
        let mut project = ProjectRecord::new(sample_project("NCCR-2024-003"), &actor(), t0()).unwrap();
        let later = t0() + Duration::minutes(5);
        project.apply_transition(Stage::ExpertReview, &actor(), "field work done", later);
        assert_eq!(project.updated_at(), later);

        let earlier = t0() - Duration::minutes(30);
        let entry = project.apply_transition(Stage::ComplianceCheck, &actor(), "reviewed", earlier);
        assert_eq!(project.updated_at(), later);
        assert_eq!(entry.at, later);
        assert_eq!(entry.sequence, 2);
    }

    #[test]
    fn test_evidence_bumps_revision() {
        let mut project = ProjectRecord::new(sample_project("NCCR-2024-004"), &actor(), t0()).unwrap();
        let evidence = Evidence {
            id: "ev-1".to_string(),
            project_id: project.id().to_string(),
            kind: EvidenceKind::Photo,
            uploaded_at: t0(),
            recorded_at: t0(),
            submitted_by: "officer-7".to_string(),
            metadata: HashMap::new(),
        };
        project.record_evidence(evidence, t0() + Duration::seconds(10));
        assert_eq!(project.evidence_revision(), 1);
        assert_eq!(project.evidence_updated_at(), Some(t0() + Duration::seconds(10)));
    }

    #[test]
    fn test_import_refuses_stages_past_compliance() {
        for stage in [Stage::ReadyForCredits, Stage::CreditsGenerated] {
            assert!(matches!(
                ProjectRecord::imported(sample_project("NCCR-2023-010"), stage, &actor(), t0()),
                Err(WorkflowError::InvalidProject(_))
            ));
        }

        let imported = ProjectRecord::imported(
            sample_project("NCCR-2023-011"),
            Stage::ComplianceCheck,
            &actor(),
            t0(),
        )
        .unwrap();
        assert_eq!(imported.stage(), Stage::ComplianceCheck);
        assert_eq!(imported.history().len(), 1);
        assert_eq!(imported.history()[0].reason, "Imported at Compliance Check");
    }
}
