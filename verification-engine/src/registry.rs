//! Registry facade: one object wiring the store, transition engine,
//! compliance runner, queue and assignment services together.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use registry_types::{
    ActorContext, CertificateRequest, ComplianceCheckResult, Evidence, EvidenceUpload, Priority,
    Result, Stage, WorkflowError,
};

use crate::assignment::{ExpertAssignmentService, ExpertDirectory, InMemoryExpertDirectory};
use crate::audit::AuditLog;
use crate::certificate::{CertificateIssuer, UnconfiguredIssuer};
use crate::clock::{Clock, SystemClock};
use crate::compliance::{
    default_battery, ComplianceCheck, ComplianceResultStore, ComplianceRunner, InMemoryResultStore,
};
use crate::config::EngineConfig;
use crate::project::{NewProject, ProjectRecord};
use crate::query::QueueQueryService;
use crate::store::{InMemoryProjectStore, ProjectRepository};
use crate::transition::{StageTransitionEngine, TransitionReceipt, TransitionRequest};

/// A recorded compliance result and the transition it caused.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceOutcome {
    pub result: ComplianceCheckResult,
    pub receipt: TransitionReceipt,
}

/// Builder for [`VerificationRegistry`].
pub struct RegistryBuilder {
    config: EngineConfig,
    repository: Option<Arc<dyn ProjectRepository>>,
    results: Option<Arc<dyn ComplianceResultStore>>,
    directory: Option<Arc<dyn ExpertDirectory>>,
    issuer: Option<Arc<dyn CertificateIssuer>>,
    clock: Option<Arc<dyn Clock>>,
    checks: Option<Vec<Arc<dyn ComplianceCheck>>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            repository: None,
            results: None,
            directory: None,
            issuer: None,
            clock: None,
            checks: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn repository(mut self, repository: Arc<dyn ProjectRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn results(mut self, results: Arc<dyn ComplianceResultStore>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn ExpertDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn issuer(mut self, issuer: Arc<dyn CertificateIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the default compliance battery.
    pub fn checks(mut self, checks: Vec<Arc<dyn ComplianceCheck>>) -> Self {
        self.checks = Some(checks);
        self
    }

    pub fn build(self) -> VerificationRegistry {
        let config = self.config;
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryProjectStore::new()));
        let results = self
            .results
            .unwrap_or_else(|| Arc::new(InMemoryResultStore::new()));
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(InMemoryExpertDirectory::new()));
        let issuer = self.issuer.unwrap_or_else(|| Arc::new(UnconfiguredIssuer));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let checks = self
            .checks
            .unwrap_or_else(|| default_battery(&config.compliance));

        let audit = Arc::new(AuditLog::with_config(config.audit.clone()));
        let engine = Arc::new(StageTransitionEngine::new(
            repository.clone(),
            results.clone(),
            audit.clone(),
            clock.clone(),
        ));
        let runner = ComplianceRunner::new(
            config.compliance.clone(),
            checks,
            repository.clone(),
            results.clone(),
            audit.clone(),
            clock.clone(),
        );
        let queue = QueueQueryService::new(repository);
        let assignments = ExpertAssignmentService::new(directory, engine.clone(), audit.clone(), clock);

        VerificationRegistry {
            config,
            engine,
            runner,
            queue,
            assignments,
            results,
            issuer,
            audit,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The verification workflow as seen by the dashboard.
pub struct VerificationRegistry {
    config: EngineConfig,
    engine: Arc<StageTransitionEngine>,
    runner: ComplianceRunner,
    queue: QueueQueryService,
    assignments: ExpertAssignmentService,
    results: Arc<dyn ComplianceResultStore>,
    issuer: Arc<dyn CertificateIssuer>,
    audit: Arc<AuditLog>,
}

impl VerificationRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Register a new submission at Panchayat Updates.
    pub async fn submit_project(&self, project: NewProject, actor: &ActorContext) -> Result<ProjectRecord> {
        self.engine.register(project, actor).await
    }

    /// Bring over a project that is already part way through verification.
    pub async fn import_project(
        &self,
        project: NewProject,
        stage: Stage,
        actor: &ActorContext,
    ) -> Result<ProjectRecord> {
        self.engine.import(project, stage, actor).await
    }

    pub async fn project(&self, project_id: &str) -> Result<ProjectRecord> {
        self.engine.project(project_id).await
    }

    pub async fn record_evidence(
        &self,
        project_id: &str,
        upload: EvidenceUpload,
        actor: &ActorContext,
    ) -> Result<Evidence> {
        self.engine.record_evidence(project_id, upload, actor).await
    }

    /// Run the compliance battery and record the result without moving the project.
    pub async fn run_compliance(&self, project_id: &str) -> Result<ComplianceCheckResult> {
        self.runner.run(project_id).await
    }

    /// Run the battery and apply its verdict.
    pub async fn conclude_compliance(
        &self,
        project_id: &str,
        actor: &ActorContext,
    ) -> Result<ComplianceOutcome> {
        let result = self.runner.run(project_id).await?;
        let receipt = self.engine.apply_verdict(&result, actor).await?;
        Ok(ComplianceOutcome { result, receipt })
    }

    pub async fn attempt_transition(&self, request: TransitionRequest) -> Result<TransitionReceipt> {
        self.engine.attempt_transition(request).await
    }

    pub async fn set_priority(
        &self,
        project_id: &str,
        priority: Priority,
        actor: &ActorContext,
    ) -> Result<ProjectRecord> {
        self.engine.set_priority(project_id, priority, actor).await
    }

    /// Finalize credits and request a certificate.
    ///
    /// The stage change commits first. If issuance then fails the project
    /// stays at Credits Generated without a certificate, and
    /// [`issue_certificate`](Self::issue_certificate) can be retried.
    pub async fn generate_credits(
        &self,
        project_id: &str,
        methodology: Option<&str>,
        actor: &ActorContext,
    ) -> Result<ProjectRecord> {
        let request = TransitionRequest::new(project_id, Stage::CreditsGenerated, actor.clone())
            .with_reason("Credits generated");
        self.engine.attempt_transition(request).await?;
        self.issue_certificate(project_id, methodology, actor).await
    }

    /// Request a certificate for a project at Credits Generated that lacks one.
    pub async fn issue_certificate(
        &self,
        project_id: &str,
        methodology: Option<&str>,
        actor: &ActorContext,
    ) -> Result<ProjectRecord> {
        let project = self.engine.project(project_id).await?;
        if project.stage() != Stage::CreditsGenerated {
            return Err(WorkflowError::PreconditionNotMet {
                project_id: project_id.to_string(),
                reason: format!(
                    "certificates are issued only at {}, project is at {}",
                    Stage::CreditsGenerated,
                    project.stage()
                ),
            });
        }
        if project.certificate_id().is_some() {
            return Ok(project);
        }

        let request = CertificateRequest {
            project_id: project_id.to_string(),
            credits_generated: project
                .generated_credits()
                .unwrap_or_else(|| project.estimated_credits()),
            methodology: methodology
                .unwrap_or(&self.config.general.default_methodology)
                .to_string(),
        };

        let certificate_id = match self.issuer.issue(&request).await {
            Ok(id) => id,
            Err(e) => {
                error!(project_id = %project_id, error = %e, "Certificate issuance failed");
                return Err(e.into());
            }
        };
        info!(project_id = %project_id, certificate_id = %certificate_id, "Certificate issued");

        self.engine
            .attach_certificate(project_id, &certificate_id, actor)
            .await
    }

    /// Recorded compliance results for a project, oldest first.
    pub async fn compliance_history(&self, project_id: &str) -> Result<Vec<ComplianceCheckResult>> {
        Ok(self.results.history_for(project_id).await?)
    }

    pub fn queue(&self) -> &QueueQueryService {
        &self.queue
    }

    pub fn assignments(&self) -> &ExpertAssignmentService {
        &self.assignments
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn engine(&self) -> &StageTransitionEngine {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn check_names(&self) -> Vec<String> {
        self.runner.check_names()
    }
}
