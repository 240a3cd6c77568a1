//! Compliance Test Runner.
//!
//! A fixed, ordered battery of named checks runs against a snapshot of a
//! project's evidence:
//!
//! 1. **Verify Panchayat Updates**: field updates exist with verified GPS
//! 2. **Check GIS Integrity**: surveyed area matches the declared area
//! 3. **Expert Data Cross-check**: expert reports approve the project
//! 4. **AI Authenticity Test**: media passes authenticity scoring
//!
//! The aggregate verdict passes only when every check passes.

mod checks;
mod results;
mod runner;

pub use checks::{
    default_battery, AiAuthenticityCheck, CheckError, CheckOutcome, ComplianceCheck,
    EvidenceSnapshot, ExpertCrossCheck, GisIntegrityCheck, PanchayatUpdatesCheck,
    AI_AUTHENTICITY, EXPERT_CROSS_CHECK, GIS_INTEGRITY, PANCHAYAT_UPDATES,
};
pub use results::{ComplianceResultStore, InMemoryResultStore};
pub use runner::ComplianceRunner;
