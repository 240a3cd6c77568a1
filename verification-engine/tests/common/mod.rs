#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use verification_engine::{
    ActorContext, ActorRole, CertificateIssuer, CertificateRequest, EcosystemType, EvidenceKind,
    EvidenceUpload, IssuanceError, ManualClock, NewProject, Priority, Stage, VerificationRegistry,
};

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, hour, 0, 0).unwrap()
}

pub fn verifier() -> ActorContext {
    ActorContext::new("verifier-7", ActorRole::Verifier)
}

pub fn officer() -> ActorContext {
    ActorContext::new("panchayat-gosaba", ActorRole::PanchayatOfficer)
}

pub fn project(id: &str) -> NewProject {
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

pub fn panchayat_update(gps_verified: bool) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::PanchayatUpdate, at(8))
        .with_meta("gps_verified", gps_verified)
        .with_meta("note", "Saplings planted along the eastern embankment")
}

pub fn gis_survey(area_hectares: f64) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::GisSurvey, at(8)).with_meta("area_hectares", area_hectares)
}

pub fn expert_report(recommendation: &str) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::ExpertReport, at(8))
        .with_meta("recommendation", recommendation)
        .with_meta("assessed_credits", 2_400)
}

pub fn drone_media(score: u32) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::DroneMedia, at(8)).with_meta("authenticity_score", score)
}

/// Evidence that passes every check in the default battery.
pub async fn record_clean_evidence(registry: &VerificationRegistry, project_id: &str) {
    for upload in [
        panchayat_update(true),
        gis_survey(124.0),
        expert_report("approve"),
        drone_media(92),
    ] {
        registry
            .record_evidence(project_id, upload, &officer())
            .await
            .unwrap();
    }
}

/// Put a project at `stage`. Ready for Credits cannot be imported, so it is
/// reached through a passing compliance run.
pub async fn place_at(registry: &VerificationRegistry, project_id: &str, stage: Stage) {
    if stage != Stage::ReadyForCredits {
        registry
            .import_project(project(project_id), stage, &verifier())
            .await
            .unwrap();
        return;
    }
    registry
        .import_project(project(project_id), Stage::ComplianceCheck, &verifier())
        .await
        .unwrap();
    record_clean_evidence(registry, project_id).await;
    let outcome = registry
        .conclude_compliance(project_id, &verifier())
        .await
        .unwrap();
    assert_eq!(outcome.receipt.to, Stage::ReadyForCredits);
}

pub fn manual_clock(hour: u32) -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_at(at(hour)))
}

/// Issuer that numbers certificates sequentially.
#[derive(Default)]
pub struct CountingIssuer {
    issued: AtomicUsize,
    pub fail: std::sync::atomic::AtomicBool,
}

impl CountingIssuer {
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateIssuer for CountingIssuer {
    async fn issue(&self, request: &CertificateRequest) -> Result<String, IssuanceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IssuanceError::Unavailable("issuer offline".to_string()));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("BCR-{}-{n:04}", request.project_id))
    }
}
