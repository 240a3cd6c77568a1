//! Compliance Test Runner - fans a battery of checks out over tasks and
//! records the joined result.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use registry_types::{
    ActorContext, ComplianceCheckResult, Result, Stage, SubTestResult, WorkflowError,
};

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::clock::Clock;
use crate::config::ComplianceConfig;
use crate::store::ProjectRepository;

use super::checks::{CheckError, CheckOutcome, ComplianceCheck, EvidenceSnapshot};
use super::results::ComplianceResultStore;

/// Runs the compliance battery for projects at Compliance Check.
///
/// Reads projects but never writes them; its only output is a
/// [`ComplianceCheckResult`] in the result store. Applying the verdict is
/// the transition engine's job.
pub struct ComplianceRunner {
    config: ComplianceConfig,
    checks: Vec<Arc<dyn ComplianceCheck>>,
    repository: Arc<dyn ProjectRepository>,
    results: Arc<dyn ComplianceResultStore>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    /// Concurrency limiter
    semaphore: Arc<Semaphore>,
}

impl ComplianceRunner {
    pub fn new(
        config: ComplianceConfig,
        checks: Vec<Arc<dyn ComplianceCheck>>,
        repository: Arc<dyn ProjectRepository>,
        results: Arc<dyn ComplianceResultStore>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_checks.max(1)));
        Self {
            config,
            checks,
            repository,
            results,
            audit,
            clock,
            semaphore,
        }
    }

    /// Names of the registered checks, in run order.
    pub fn check_names(&self) -> Vec<String> {
        self.checks.iter().map(|c| c.name().to_string()).collect()
    }

    /// Run the full battery against the project's current evidence.
    ///
    /// The result is recorded before it is returned. If evidence arrives
    /// while the checks are running, the result is discarded and
    /// [`WorkflowError::StaleEvidence`] is returned instead.
    pub async fn run(&self, project_id: &str) -> Result<ComplianceCheckResult> {
        let project = self.repository.get(project_id).await?;
        if project.stage() != Stage::ComplianceCheck {
            return Err(WorkflowError::PreconditionNotMet {
                project_id: project_id.to_string(),
                reason: format!(
                    "compliance checks run only at {}, project is at {}",
                    Stage::ComplianceCheck,
                    project.stage()
                ),
            });
        }

        let started_at = self.clock.now();
        let snapshot = Arc::new(EvidenceSnapshot::capture(&project, started_at));

        info!(
            project_id = %project_id,
            evidence_revision = snapshot.evidence_revision,
            checks = self.checks.len(),
            "Starting compliance run"
        );

        let sub_tests = self.execute_battery(&snapshot).await;
        let completed_at = self.clock.now();

        let result = ComplianceCheckResult {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            evidence_revision: snapshot.evidence_revision,
            evidence_snapshot_at: snapshot.evidence_updated_at,
            started_at,
            completed_at,
            sub_tests,
        };

        let current = self.repository.get(project_id).await?;
        if current.evidence_revision() != snapshot.evidence_revision {
            warn!(
                project_id = %project_id,
                snapshot_revision = snapshot.evidence_revision,
                current_revision = current.evidence_revision(),
                "Discarding compliance result computed against stale evidence"
            );
            let err = WorkflowError::StaleEvidence {
                project_id: project_id.to_string(),
                snapshot_revision: snapshot.evidence_revision,
                current_revision: current.evidence_revision(),
            };
            self.audit
                .record(AuditEntry::rejected(
                    project_id,
                    AuditAction::ComplianceDiscarded {
                        snapshot_revision: snapshot.evidence_revision,
                        current_revision: current.evidence_revision(),
                    },
                    &ActorContext::system(),
                    completed_at,
                    err.rejection(),
                ))
                .await;
            return Err(err);
        }

        self.results.record(result.clone()).await?;

        self.audit
            .record(AuditEntry::accepted(
                project_id,
                AuditAction::ComplianceRun {
                    result_id: result.id.clone(),
                    passed: result.passed(),
                },
                &ActorContext::system(),
                completed_at,
            ))
            .await;

        info!(
            project_id = %project_id,
            result_id = %result.id,
            passed = result.passed(),
            score = result.overall_score(),
            "Compliance run recorded"
        );

        Ok(result)
    }

    /// Spawn every check, then join on all of them. Output keeps battery order.
    async fn execute_battery(&self, snapshot: &Arc<EvidenceSnapshot>) -> Vec<SubTestResult> {
        let timeout_ms = self.config.check_timeout_ms;
        let mut names = Vec::with_capacity(self.checks.len());
        let mut handles = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            names.push(check.name().to_string());

            let check = Arc::clone(check);
            let snapshot = Arc::clone(snapshot);
            let semaphore = Arc::clone(&self.semaphore);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| CheckError::Failed("runner is shutting down".to_string()))?;

                debug!(check = %check.name(), project_id = %snapshot.project_id, "Executing check");

                let timeout = tokio::time::Duration::from_millis(timeout_ms);
                match tokio::time::timeout(timeout, check.evaluate(&snapshot)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CheckError::TimedOut(timeout_ms)),
                }
            }));
        }

        let joined = futures::future::join_all(handles).await;

        names
            .into_iter()
            .zip(joined)
            .map(|(name, joined)| match joined {
                Ok(Ok(CheckOutcome {
                    passed: true,
                    score,
                    ..
                })) => SubTestResult::pass(name, score),
                Ok(Ok(CheckOutcome { score, issues, .. })) => SubTestResult::fail(name, score, issues),
                Ok(Err(e)) => {
                    warn!(check = %name, error = %e, "Check could not complete");
                    SubTestResult::fail(name, 0, vec![e.to_string()])
                }
                Err(e) => {
                    error!(check = %name, error = %e, "Check task aborted");
                    SubTestResult::fail(name, 0, vec![format!("check aborted: {e}")])
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::compliance::results::InMemoryResultStore;
    use crate::project::tests::sample_project;
    use crate::project::ProjectRecord;
    use crate::store::InMemoryProjectStore;
    use async_trait::async_trait;
    use chrono::Utc;

    struct Fixed {
        name: &'static str,
        outcome: fn() -> std::result::Result<CheckOutcome, CheckError>,
    }

    #[async_trait]
    impl ComplianceCheck for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn evaluate(
            &self,
            _snapshot: &EvidenceSnapshot,
        ) -> std::result::Result<CheckOutcome, CheckError> {
            (self.outcome)()
        }
    }

    struct Slow;

    #[async_trait]
    impl ComplianceCheck for Slow {
        fn name(&self) -> &str {
            "Slow"
        }

        async fn evaluate(
            &self,
            _snapshot: &EvidenceSnapshot,
        ) -> std::result::Result<CheckOutcome, CheckError> {
            tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
            Ok(CheckOutcome::from_issues(100, vec![]))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ComplianceCheck for Panicking {
        fn name(&self) -> &str {
            "Panicking"
        }

        async fn evaluate(
            &self,
            _snapshot: &EvidenceSnapshot,
        ) -> std::result::Result<CheckOutcome, CheckError> {
            panic!("sensor feed corrupted")
        }
    }

    async fn runner_with(
        checks: Vec<Arc<dyn ComplianceCheck>>,
        stage: Stage,
    ) -> (ComplianceRunner, Arc<InMemoryResultStore>) {
        let repository = Arc::new(InMemoryProjectStore::new());
        let record = ProjectRecord::imported(
            sample_project("NCCR-2024-001"),
            stage,
            &ActorContext::system(),
            Utc::now(),
        )
        .unwrap();
        repository.insert(record).await.unwrap();

        let results = Arc::new(InMemoryResultStore::new());
        let config = ComplianceConfig {
            check_timeout_ms: 50,
            ..Default::default()
        };
        let runner = ComplianceRunner::new(
            config,
            checks,
            repository,
            results.clone(),
            Arc::new(AuditLog::new()),
            Arc::new(SystemClock),
        );
        (runner, results)
    }

    #[tokio::test]
    async fn test_all_pass_records_passing_result() {
        let checks: Vec<Arc<dyn ComplianceCheck>> = vec![
            Arc::new(Fixed {
                name: "A",
                outcome: || Ok(CheckOutcome::from_issues(90, vec![])),
            }),
            Arc::new(Fixed {
                name: "B",
                outcome: || Ok(CheckOutcome::from_issues(80, vec![])),
            }),
        ];
        let (runner, results) = runner_with(checks, Stage::ComplianceCheck).await;

        let result = runner.run("NCCR-2024-001").await.unwrap();
        assert!(result.passed());
        assert_eq!(result.sub_tests[0].name, "A");
        assert_eq!(result.sub_tests[1].name, "B");

        let stored = results.latest_for("NCCR-2024-001").await.unwrap().unwrap();
        assert_eq!(stored, result);
    }

    #[tokio::test]
    async fn test_missing_evidence_is_recorded_as_failure() {
        let checks: Vec<Arc<dyn ComplianceCheck>> = vec![Arc::new(Fixed {
            name: "GIS",
            outcome: || Err(CheckError::MissingEvidence("no GIS survey on record".to_string())),
        })];
        let (runner, _) = runner_with(checks, Stage::ComplianceCheck).await;

        let result = runner.run("NCCR-2024-001").await.unwrap();
        assert!(!result.passed());
        assert_eq!(
            result.sub_tests[0].issues,
            vec!["missing evidence: no GIS survey on record".to_string()]
        );
    }

    #[tokio::test]
    async fn test_timeout_and_panic_fail_their_subtests() {
        let checks: Vec<Arc<dyn ComplianceCheck>> = vec![
            Arc::new(Slow),
            Arc::new(Panicking),
            Arc::new(Fixed {
                name: "Fine",
                outcome: || Ok(CheckOutcome::from_issues(100, vec![])),
            }),
        ];
        let (runner, _) = runner_with(checks, Stage::ComplianceCheck).await;

        let result = runner.run("NCCR-2024-001").await.unwrap();
        assert_eq!(result.sub_tests.len(), 3);
        assert!(!result.sub_tests[0].passed);
        assert_eq!(result.sub_tests[0].issues, vec!["check timed out after 50 ms".to_string()]);
        assert!(!result.sub_tests[1].passed);
        assert!(result.sub_tests[1].issues[0].starts_with("check aborted"));
        assert!(result.sub_tests[2].passed);
        assert!(!result.passed());
    }

    #[tokio::test]
    async fn test_refuses_outside_compliance_stage() {
        let (runner, results) = runner_with(vec![], Stage::ExpertReview).await;
        let err = runner.run("NCCR-2024-001").await.unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
        assert!(results.latest_for("NCCR-2024-001").await.unwrap().is_none());
    }
}
