//! Verification Engine - the blue carbon registry's workflow core
//!
//! Moves restoration projects through the verification pipeline:
//!
//! - **Stage transitions**: adjacency-checked, gated, optimistic commits
//! - **Compliance runs**: a parallel battery of checks with an AND verdict
//! - **Queue views**: stage lists, search and counts over one snapshot
//! - **Expert assignments**: forward-only status tracking
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   VerificationRegistry                       │
//! │                                                              │
//! │  ┌────────────┐   ┌──────────────┐   ┌──────────────────┐   │
//! │  │ Compliance │──▶│  Transition  │◀──│     Expert       │   │
//! │  │   Runner   │   │    Engine    │   │   Assignments    │   │
//! │  └─────┬──────┘   └──────┬───────┘   └──────────────────┘   │
//! │        │ results         │ commit                            │
//! │  ┌─────▼──────┐   ┌──────▼───────┐   ┌──────────────────┐   │
//! │  │  Result    │   │   Project    │──▶│   Queue Query    │   │
//! │  │   Store    │   │  Repository  │   │     Service      │   │
//! │  └────────────┘   └──────────────┘   └──────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod assignment;
pub mod audit;
pub mod certificate;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod project;
pub mod query;
pub mod registry;
pub mod store;
pub mod transition;

// Re-export main types
pub use assignment::{ExpertAssignmentService, ExpertDirectory, InMemoryExpertDirectory};
pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use certificate::{CertificateIssuer, IssuanceError, UnconfiguredIssuer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compliance::{ComplianceCheck, ComplianceResultStore, ComplianceRunner, InMemoryResultStore};
pub use config::EngineConfig;
pub use project::{NewProject, ProjectRecord};
pub use query::{ProjectSummary, QueueQuery, QueueQueryService, QueueSort, StageCounts};
pub use registry::{ComplianceOutcome, RegistryBuilder, VerificationRegistry};
pub use store::{InMemoryProjectStore, ProjectRepository, StoreError};
pub use transition::{StageTransitionEngine, TransitionReceipt, TransitionRequest};
pub use registry_types::*;
