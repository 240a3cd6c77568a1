//! Shared domain types for the blue carbon verification registry.
//!
//! Projects move through a fixed pipeline of verification stages:
//!
//! - **Panchayat Updates**: field updates from the implementing Panchayat
//! - **Tampered Data**: uploads flagged as manipulated
//! - **Expert Review**: assigned experts examine the evidence
//! - **Compliance Check**: automated battery gates issuance
//! - **Ready for Credits**: cleared for issuance
//! - **Credits Generated** / **Rejected**: terminal, retained for audit
//!
//! # Key Components
//!
//! - [`Stage`]: Closed stage enum carrying the adjacency table
//! - [`ComplianceCheckResult`]: Immutable record of a compliance run
//! - [`WorkflowError`]: Rejection taxonomy with display reasons

pub mod compliance;
pub mod error;
pub mod stage;
pub mod types;

// Re-export main types
pub use compliance::{ComplianceCheckResult, SubTestResult};
pub use error::{ErrorKind, Rejection, Result, WorkflowError};
pub use stage::{Stage, StageFilter, StageHistoryEntry};
pub use types::*;
