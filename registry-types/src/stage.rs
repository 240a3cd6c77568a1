//! Verification pipeline stages and the fixed adjacency table.
//!
//! ```text
//! PanchayatUpdates ──► TamperedData ──► (back to PanchayatUpdates)
//!        │
//!        └──► ExpertReview ──► ComplianceCheck ──► ReadyForCredits ──► CreditsGenerated
//!                                     │
//!                                     └──► PanchayatUpdates (remediation)
//!
//! Every non-terminal stage except ReadyForCredits may also move to Rejected.
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ActorRole;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Stage of a project in the verification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Entry stage; field updates from the Panchayat
    PanchayatUpdates,
    /// Uploads flagged as manipulated or inconsistent
    TamperedData,
    /// Assigned experts are reviewing the evidence
    ExpertReview,
    /// Automated compliance battery gates progress
    ComplianceCheck,
    /// Cleared for issuance
    ReadyForCredits,
    /// Credits finalized and certified (terminal)
    CreditsGenerated,
    /// Permanently declined (terminal)
    Rejected,
}

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Stage; 7] = [
        Stage::PanchayatUpdates,
        Stage::TamperedData,
        Stage::ExpertReview,
        Stage::ComplianceCheck,
        Stage::ReadyForCredits,
        Stage::CreditsGenerated,
        Stage::Rejected,
    ];

    /// Stages reachable in one step from this one.
    pub fn successors(&self) -> &'static [Stage] {
        match self {
            Self::PanchayatUpdates => &[Self::TamperedData, Self::ExpertReview, Self::Rejected],
            Self::TamperedData => &[Self::PanchayatUpdates, Self::Rejected],
            Self::ExpertReview => &[Self::ComplianceCheck, Self::Rejected],
            Self::ComplianceCheck => &[Self::ReadyForCredits, Self::PanchayatUpdates, Self::Rejected],
            Self::ReadyForCredits => &[Self::CreditsGenerated],
            Self::CreditsGenerated | Self::Rejected => &[],
        }
    }

    /// Check the adjacency table.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        self.successors().contains(&target)
    }

    /// Terminal stages are retained for audit and never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CreditsGenerated | Self::Rejected)
    }

    /// Display label used by the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PanchayatUpdates => "Panchayat Updates",
            Self::TamperedData => "Tampered Data",
            Self::ExpertReview => "Expert Review",
            Self::ComplianceCheck => "Compliance Check",
            Self::ReadyForCredits => "Ready for Credits",
            Self::CreditsGenerated => "Credits Generated",
            Self::Rejected => "Rejected",
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::PanchayatUpdates
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in a project's append-only stage history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct StageHistoryEntry {
    /// Position in the history, starting at 0 for creation
    pub sequence: u64,
    /// Previous stage; `None` for the creation entry
    pub from: Option<Stage>,
    /// Stage entered
    pub to: Stage,
    /// Actor responsible
    pub actor_id: String,
    /// Role the actor held
    pub role: ActorRole,
    /// When the stage was entered
    pub at: DateTime<Utc>,
    /// Human-readable reason
    pub reason: String,
}

/// Filter over stages used by queue views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum StageFilter {
    All,
    Only(Stage),
}

impl StageFilter {
    /// Whether a stage passes the filter.
    pub fn matches(&self, stage: Stage) -> bool {
        match self {
            Self::All => true,
            Self::Only(s) => *s == stage,
        }
    }
}

impl Default for StageFilter {
    fn default() -> Self {
        Self::All
    }
}

impl From<Stage> for StageFilter {
    fn from(stage: Stage) -> Self {
        Self::Only(stage)
    }
}
