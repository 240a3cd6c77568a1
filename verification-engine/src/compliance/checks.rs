//! Compliance checks and the built-in battery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use registry_types::{EcosystemType, Evidence, EvidenceKind, Stage};

use crate::config::ComplianceConfig;
use crate::project::ProjectRecord;

pub const PANCHAYAT_UPDATES: &str = "Verify Panchayat Updates";
pub const GIS_INTEGRITY: &str = "Check GIS Integrity";
pub const EXPERT_CROSS_CHECK: &str = "Expert Data Cross-check";
pub const AI_AUTHENTICITY: &str = "AI Authenticity Test";

/// Expert credit assessments may differ from the estimate by this much.
const CREDIT_VARIANCE_PCT: f64 = 20.0;

/// Read-only view of a project's evidence at the start of a run.
#[derive(Debug, Clone)]
pub struct EvidenceSnapshot {
    pub project_id: String,
    pub stage: Stage,
    pub ecosystem: EcosystemType,
    pub hectares_restored: f64,
    pub estimated_credits: u64,
    pub evidence: Vec<Evidence>,
    pub evidence_revision: u64,
    pub evidence_updated_at: Option<DateTime<Utc>>,
    pub taken_at: DateTime<Utc>,
}

impl EvidenceSnapshot {
    /// Capture the evidence state of a project.
    pub fn capture(project: &ProjectRecord, taken_at: DateTime<Utc>) -> Self {
        Self {
            project_id: project.id().to_string(),
            stage: project.stage(),
            ecosystem: project.ecosystem(),
            hectares_restored: project.hectares_restored(),
            estimated_credits: project.estimated_credits(),
            evidence: project.evidence().to_vec(),
            evidence_revision: project.evidence_revision(),
            evidence_updated_at: project.evidence_updated_at(),
            taken_at,
        }
    }

    /// Evidence of one kind, in upload order.
    pub fn of_kind(&self, kind: EvidenceKind) -> impl Iterator<Item = &Evidence> {
        self.evidence.iter().filter(move |e| e.kind == kind)
    }
}

/// Result of a check that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Confidence score (0 - 100)
    pub score: u8,
    pub issues: Vec<String>,
}

impl CheckOutcome {
    /// Passed iff no issues were found.
    pub fn from_issues(score: u8, issues: Vec<String>) -> Self {
        Self {
            passed: issues.is_empty(),
            score: score.min(100),
            issues,
        }
    }
}

/// Reasons a check could not produce an outcome.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Required evidence is absent
    #[error("missing evidence: {0}")]
    MissingEvidence(String),

    /// Evidence exists but its metadata is unusable
    #[error("invalid evidence: {0}")]
    InvalidEvidence(String),

    /// Check exceeded its time budget
    #[error("check timed out after {0} ms")]
    TimedOut(u64),

    /// Any other failure
    #[error("check failed: {0}")]
    Failed(String),
}

/// A named compliance check.
///
/// Checks share no mutable state and may run concurrently.
#[async_trait]
pub trait ComplianceCheck: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Evaluate the snapshot.
    async fn evaluate(&self, snapshot: &EvidenceSnapshot) -> Result<CheckOutcome, CheckError>;
}

/// Panchayat field updates exist and carry verified GPS fixes.
pub struct PanchayatUpdatesCheck {
    min_updates: usize,
}

impl PanchayatUpdatesCheck {
    pub fn new(min_updates: usize) -> Self {
        Self { min_updates }
    }
}

#[async_trait]
impl ComplianceCheck for PanchayatUpdatesCheck {
    fn name(&self) -> &str {
        PANCHAYAT_UPDATES
    }

    async fn evaluate(&self, snapshot: &EvidenceSnapshot) -> Result<CheckOutcome, CheckError> {
        let updates: Vec<&Evidence> = snapshot.of_kind(EvidenceKind::PanchayatUpdate).collect();
        if updates.is_empty() || updates.len() < self.min_updates {
            return Err(CheckError::MissingEvidence(format!(
                "{} Panchayat update(s) required, {} on record",
                self.min_updates.max(1),
                updates.len()
            )));
        }

        let mismatched = updates
            .iter()
            .filter(|u| u.meta_bool("gps_verified") == Some(false))
            .count();
        let score = ((updates.len() - mismatched) * 100 / updates.len()) as u8;

        let mut issues = Vec::new();
        if mismatched > 0 {
            issues.push("GPS mismatch".to_string());
        }
        Ok(CheckOutcome::from_issues(score, issues))
    }
}

/// Latest GIS survey agrees with the declared restored area.
pub struct GisIntegrityCheck {
    tolerance_pct: f64,
}

impl GisIntegrityCheck {
    pub fn new(tolerance_pct: f64) -> Self {
        Self { tolerance_pct }
    }
}

#[async_trait]
impl ComplianceCheck for GisIntegrityCheck {
    fn name(&self) -> &str {
        GIS_INTEGRITY
    }

    async fn evaluate(&self, snapshot: &EvidenceSnapshot) -> Result<CheckOutcome, CheckError> {
        let survey = snapshot
            .of_kind(EvidenceKind::GisSurvey)
            .max_by_key(|e| e.uploaded_at)
            .ok_or_else(|| CheckError::MissingEvidence("no GIS survey on record".to_string()))?;

        let area = survey.meta_f64("area_hectares").ok_or_else(|| {
            CheckError::InvalidEvidence(format!("GIS survey {} has no area_hectares", survey.id))
        })?;

        let declared = snapshot.hectares_restored;
        let deviation_pct = (area - declared).abs() * 100.0 / declared;
        let score = (100.0 - deviation_pct).clamp(0.0, 100.0).round() as u8;

        let mut issues = Vec::new();
        if deviation_pct > self.tolerance_pct {
            issues.push(format!(
                "Surveyed area {area:.1} ha deviates {deviation_pct:.1}% from declared {declared:.1} ha"
            ));
        }
        if survey.meta_bool("boundary_overlap") == Some(true) {
            issues.push("Boundary overlaps another registered project".to_string());
        }
        Ok(CheckOutcome::from_issues(score, issues))
    }
}

/// Expert reports approve the project and agree with the credit estimate.
pub struct ExpertCrossCheck;

#[async_trait]
impl ComplianceCheck for ExpertCrossCheck {
    fn name(&self) -> &str {
        EXPERT_CROSS_CHECK
    }

    async fn evaluate(&self, snapshot: &EvidenceSnapshot) -> Result<CheckOutcome, CheckError> {
        let reports: Vec<&Evidence> = snapshot.of_kind(EvidenceKind::ExpertReport).collect();
        if reports.is_empty() {
            return Err(CheckError::MissingEvidence(
                "no expert report uploaded".to_string(),
            ));
        }

        let mut issues = Vec::new();
        let mut approving = 0usize;
        for report in &reports {
            match report.meta_str("recommendation") {
                Some("approve") => approving += 1,
                Some(other) => issues.push(format!("Expert report {} recommends {other}", report.id)),
                None => issues.push(format!("Expert report {} has no recommendation", report.id)),
            }

            if let Some(assessed) = report.meta_f64("assessed_credits") {
                let estimate = snapshot.estimated_credits as f64;
                if estimate > 0.0 && (assessed - estimate).abs() * 100.0 / estimate > CREDIT_VARIANCE_PCT {
                    issues.push(format!(
                        "Expert assessment of {assessed:.0} tCO2e differs from estimate {estimate:.0} tCO2e"
                    ));
                }
            }
        }

        let score = (approving * 100 / reports.len()) as u8;
        Ok(CheckOutcome::from_issues(score, issues))
    }
}

/// Photo and drone media carry an authenticity score above the threshold.
pub struct AiAuthenticityCheck {
    min_score: u8,
}

impl AiAuthenticityCheck {
    pub fn new(min_score: u8) -> Self {
        Self { min_score }
    }
}

#[async_trait]
impl ComplianceCheck for AiAuthenticityCheck {
    fn name(&self) -> &str {
        AI_AUTHENTICITY
    }

    async fn evaluate(&self, snapshot: &EvidenceSnapshot) -> Result<CheckOutcome, CheckError> {
        let media: Vec<&Evidence> = snapshot.evidence.iter().filter(|e| e.kind.is_media()).collect();
        if media.is_empty() {
            return Err(CheckError::MissingEvidence(
                "no photo or drone media uploaded".to_string(),
            ));
        }

        let mut issues = Vec::new();
        let mut lowest = 100.0f64;
        for item in &media {
            match item.meta_f64("authenticity_score") {
                Some(score) => {
                    lowest = lowest.min(score);
                    if score < self.min_score as f64 {
                        issues.push(format!(
                            "Media {} scored {score:.0}, below {}",
                            item.id, self.min_score
                        ));
                    }
                }
                None => {
                    lowest = 0.0;
                    issues.push(format!("Media {} has not been scored", item.id));
                }
            }
        }

        Ok(CheckOutcome::from_issues(lowest.clamp(0.0, 100.0) as u8, issues))
    }
}

/// The standard battery, in run order.
pub fn default_battery(config: &ComplianceConfig) -> Vec<Arc<dyn ComplianceCheck>> {
    vec![
        Arc::new(PanchayatUpdatesCheck::new(config.min_panchayat_updates)),
        Arc::new(GisIntegrityCheck::new(config.gis_area_tolerance_pct)),
        Arc::new(ExpertCrossCheck),
        Arc::new(AiAuthenticityCheck::new(config.min_authenticity_score)),
    ]
}
