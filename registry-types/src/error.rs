//! Error taxonomy for the verification workflow.
//!
//! Every variant has a machine-readable [`ErrorKind`] and a human-readable
//! reason suitable for direct display in the dashboard.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::types::AssignmentStatus;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    PreconditionNotMet,
    StaleEvidence,
    ConcurrentModification,
    NotFound,
    AlreadyExists,
    InvalidInput,
    ExpertUnavailable,
    CertificateIssuance,
    StorageUnavailable,
}

/// A rejection as shown to a user: kind plus display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Rejection {
    /// Machine-readable kind
    pub kind: ErrorKind,
    /// Display text
    pub reason: String,
}

/// Errors raised by the verification workflow.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    /// Target stage is not adjacent to the current one
    #[error("Project {project_id} cannot move from {from} to {to}")]
    InvalidTransition {
        project_id: String,
        from: Stage,
        to: Stage,
    },

    /// A gate on the target stage is not satisfied
    #[error("Project {project_id} is not ready: {reason}")]
    PreconditionNotMet { project_id: String, reason: String },

    /// Compliance verdict computed against superseded evidence
    #[error(
        "Compliance run for {project_id} used evidence revision {snapshot_revision}, \
         but revision {current_revision} arrived before it finished; re-run the checks"
    )]
    StaleEvidence {
        project_id: String,
        snapshot_revision: u64,
        current_revision: u64,
    },

    /// Another writer changed the project first
    #[error(
        "Project {project_id} was modified by someone else (expected version {expected}, found {actual}); \
         reload and try again"
    )]
    ConcurrentModification {
        project_id: String,
        expected: u64,
        actual: u64,
    },

    /// Project does not exist
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Project ID already registered
    #[error("Project already exists: {0}")]
    ProjectAlreadyExists(String),

    /// Submitted project data is invalid
    #[error("Invalid project data: {0}")]
    InvalidProject(String),

    /// Assignment does not exist
    #[error("Expert assignment not found: {0}")]
    AssignmentNotFound(String),

    /// Expert missing from the directory
    #[error("Expert not found: {0}")]
    ExpertNotFound(String),

    /// Expert cannot take new work
    #[error("Expert {0} is not available for assignment")]
    ExpertUnavailable(String),

    /// Assignment status may only move one step forward
    #[error("Assignment {assignment_id} cannot move from {from} to {to}")]
    InvalidAssignmentTransition {
        assignment_id: String,
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    /// External certificate issuer failed
    #[error("Certificate issuance failed: {0}")]
    CertificateIssuance(String),

    /// Durable storage cannot be reached
    #[error("Registry storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl WorkflowError {
    /// Machine-readable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. } | Self::InvalidAssignmentTransition { .. } => {
                ErrorKind::InvalidTransition
            }
            Self::PreconditionNotMet { .. } => ErrorKind::PreconditionNotMet,
            Self::StaleEvidence { .. } => ErrorKind::StaleEvidence,
            Self::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            Self::ProjectNotFound(_) | Self::AssignmentNotFound(_) | Self::ExpertNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::ProjectAlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::InvalidProject(_) => ErrorKind::InvalidInput,
            Self::ExpertUnavailable(_) => ErrorKind::ExpertUnavailable,
            Self::CertificateIssuance(_) => ErrorKind::CertificateIssuance,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }

    /// Human-readable reason for display.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Only storage loss is fatal; everything else is a caller-level rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Whether retrying against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::StaleEvidence { .. }
        )
    }

    /// Serializable form for the dashboard.
    pub fn rejection(&self) -> Rejection {
        Rejection {
            kind: self.kind(),
            reason: self.reason(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
