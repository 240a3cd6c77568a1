//! Core value types for the verification registry.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs so the dashboard renders the same shapes the engine produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Coastal ecosystem a restoration project works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EcosystemType {
    Mangrove,
    Seagrass,
    SaltMarsh,
    CoralReef,
    Estuary,
}

impl EcosystemType {
    /// Display label used by the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mangrove => "Mangrove",
            Self::Seagrass => "Seagrass",
            Self::SaltMarsh => "Salt Marsh",
            Self::CoralReef => "Coral Reef",
            Self::Estuary => "Estuary",
        }
    }
}

impl fmt::Display for EcosystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Editorial priority. Has no influence on which transitions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        })
    }
}

/// Role of the caller performing a mutation.
///
/// Supplied by the authentication layer; the registry trusts it as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Administrator,
    Verifier,
    Expert,
    PanchayatOfficer,
    NgoPartner,
    /// Automated consequence applied by the engine itself
    System,
}

/// Identity attached to every mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ActorContext {
    /// External actor identifier
    pub actor_id: String,
    /// Role claimed by the actor
    pub role: ActorRole,
}

impl ActorContext {
    /// Create a new actor context.
    pub fn new(actor_id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
        }
    }

    /// The engine acting on its own behalf.
    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }
}

/// Kind of evidence uploaded for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Field update filed by the implementing Panchayat
    PanchayatUpdate,
    Photo,
    Document,
    /// Drone imagery or video
    DroneMedia,
    /// Boundary survey from the GIS console
    GisSurvey,
    /// Report uploaded by an assigned expert
    ExpertReport,
}

impl EvidenceKind {
    /// Whether this kind carries imagery subject to authenticity scoring.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Photo | Self::DroneMedia)
    }
}

/// Evidence upload as handed over by the ingestion collaborator.
///
/// File contents are never inspected; only presence and metadata matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EvidenceUpload {
    /// Kind of evidence
    pub kind: EvidenceKind,
    /// When the file reached the ingestion service
    pub uploaded_at: DateTime<Utc>,
    /// Free-form metadata extracted by the ingestion service
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EvidenceUpload {
    /// Create an upload with no metadata.
    pub fn new(kind: EvidenceKind, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            uploaded_at,
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Evidence as recorded against a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Evidence {
    /// Unique evidence ID
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Kind of evidence
    pub kind: EvidenceKind,
    /// Upload time reported by ingestion
    pub uploaded_at: DateTime<Utc>,
    /// When the registry recorded it
    pub recorded_at: DateTime<Utc>,
    /// Actor that submitted it
    pub submitted_by: String,
    /// Metadata from ingestion
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Evidence {
    /// Read a boolean metadata flag.
    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(|v| v.as_bool())
    }

    /// Read a numeric metadata value.
    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.as_f64())
    }

    /// Read a string metadata value.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Availability of an expert in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Busy,
    OnLeave,
}

/// Expert record supplied by the expert directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Expert {
    /// Directory ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Role, e.g. "Marine Biologist"
    pub role: String,
    /// Specialization, e.g. "Mangrove carbon stock"
    pub specialization: String,
    /// Current availability
    pub availability: Availability,
}

/// Lifecycle of an expert assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned = 0,
    InProgress = 1,
    ReportUploaded = 2,
    Completed = 3,
}

impl AssignmentStatus {
    /// The only status this one may move to.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Assigned => Some(Self::InProgress),
            Self::InProgress => Some(Self::ReportUploaded),
            Self::ReportUploaded => Some(Self::Completed),
            Self::Completed => None,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::ReportUploaded => "Report Uploaded",
            Self::Completed => "Completed",
        })
    }
}

/// An expert bound to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExpertAssignment {
    /// Unique assignment ID
    pub id: String,
    /// Project under review
    pub project_id: String,
    /// Assigned expert
    pub expert_id: String,
    /// Current status
    pub status: AssignmentStatus,
    /// Who made the assignment
    pub assigned_by: String,
    /// When the assignment was made
    pub assigned_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
    /// Statuses passed through, oldest first
    pub status_history: Vec<(AssignmentStatus, DateTime<Utc>)>,
}

/// Request handed to the certificate issuance collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CertificateRequest {
    /// Project whose credits are certified
    pub project_id: String,
    /// Finalized credits (tCO2e)
    pub credits_generated: u64,
    /// Accounting methodology, e.g. "VM0033"
    pub methodology: String,
}
