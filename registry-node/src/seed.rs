//! Sample projects, experts and field evidence for the demo run.

use chrono::{Duration, Utc};

use registry_types::{
    Availability, EcosystemType, EvidenceKind, EvidenceUpload, Expert, Priority,
};
use verification_engine::NewProject;

pub fn projects() -> Vec<NewProject> {
    vec![
        project(
            "NCCR-2024-001",
            "Sundarbans Mangrove Restoration",
            EcosystemType::Mangrove,
            "Gosaba Gram Panchayat",
            "Coastal Green Trust",
            125.5,
            2_450,
            Priority::High,
        ),
        project(
            "NCCR-2024-002",
            "Palk Bay Seagrass Meadows",
            EcosystemType::Seagrass,
            "Mandapam Gram Panchayat",
            "Ocean Roots Foundation",
            48.0,
            1_180,
            Priority::Medium,
        ),
        project(
            "NCCR-2024-003",
            "Chilika Lagoon Salt Marsh",
            EcosystemType::SaltMarsh,
            "Satapada Gram Panchayat",
            "Wetland Futures",
            62.3,
            940,
            Priority::Low,
        ),
        project(
            "NCCR-2024-004",
            "Kadalundi Estuary Buffer",
            EcosystemType::Estuary,
            "Kadalundi Gram Panchayat",
            "Malabar Nature Collective",
            30.0,
            520,
            Priority::Medium,
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn project(
    id: &str,
    title: &str,
    ecosystem: EcosystemType,
    panchayat: &str,
    ngo_partner: &str,
    hectares_restored: f64,
    estimated_credits: u64,
    priority: Priority,
) -> NewProject {
    NewProject {
        id: id.to_string(),
        title: title.to_string(),
        ecosystem,
        panchayat: panchayat.to_string(),
        ngo_partner: ngo_partner.to_string(),
        hectares_restored,
        estimated_credits,
        priority,
    }
}

pub fn experts() -> Vec<Expert> {
    vec![
        Expert {
            id: "exp-meera".to_string(),
            name: "Dr. Meera Nair".to_string(),
            role: "Marine Biologist".to_string(),
            specialization: "Mangrove carbon stock".to_string(),
            availability: Availability::Available,
        },
        Expert {
            id: "exp-arjun".to_string(),
            name: "Arjun Rao".to_string(),
            role: "GIS Analyst".to_string(),
            specialization: "Coastal remote sensing".to_string(),
            availability: Availability::Available,
        },
        Expert {
            id: "exp-kavya".to_string(),
            name: "Kavya Iyer".to_string(),
            role: "Soil Scientist".to_string(),
            specialization: "Sediment carbon".to_string(),
            availability: Availability::OnLeave,
        },
    ]
}

pub fn panchayat_update(gps_verified: bool) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::PanchayatUpdate, Utc::now() - Duration::days(3))
        .with_meta("gps_verified", gps_verified)
        .with_meta("saplings_planted", 1_200)
}

pub fn gis_survey(area_hectares: f64) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::GisSurvey, Utc::now() - Duration::days(2))
        .with_meta("area_hectares", area_hectares)
        .with_meta("boundary_overlap", false)
}

pub fn drone_media(authenticity_score: u32) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::DroneMedia, Utc::now() - Duration::days(1))
        .with_meta("authenticity_score", authenticity_score)
}

pub fn expert_report(recommendation: &str, assessed_credits: u64) -> EvidenceUpload {
    EvidenceUpload::new(EvidenceKind::ExpertReport, Utc::now())
        .with_meta("recommendation", recommendation)
        .with_meta("assessed_credits", assessed_credits)
}
