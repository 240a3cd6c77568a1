//! Audit trail for registry mutations.
//!
//! Records accepted changes and rejected attempts alike, newest first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use registry_types::{ActorContext, ActorRole, AssignmentStatus, EvidenceKind, Priority, Rejection, Stage};

use crate::config::AuditConfig;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    Submitted,
    Imported { stage: Stage },
    Transition { from: Stage, to: Stage },
    EvidenceRecorded { kind: EvidenceKind, revision: u64 },
    ComplianceRun { result_id: String, passed: bool },
    ComplianceDiscarded { snapshot_revision: u64, current_revision: u64 },
    CertificateAttached { certificate_id: String },
    PriorityChanged { priority: Priority },
    AssignmentChanged { assignment_id: String, status: AssignmentStatus },
}

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub entry_id: String,
    /// Project concerned
    pub project_id: String,
    /// Action attempted or applied
    pub action: AuditAction,
    /// Who acted
    pub actor_id: String,
    /// Role held
    pub role: ActorRole,
    /// When
    pub at: DateTime<Utc>,
    /// Present when the attempt was refused
    pub rejection: Option<Rejection>,
}

impl AuditEntry {
    /// An applied change.
    pub fn accepted(
        project_id: impl Into<String>,
        action: AuditAction,
        actor: &ActorContext,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            action,
            actor_id: actor.actor_id.clone(),
            role: actor.role,
            at,
            rejection: None,
        }
    }

    /// A refused attempt.
    pub fn rejected(
        project_id: impl Into<String>,
        action: AuditAction,
        actor: &ActorContext,
        at: DateTime<Utc>,
        rejection: Rejection,
    ) -> Self {
        Self {
            rejection: Some(rejection),
            ..Self::accepted(project_id, action, actor, at)
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.rejection.is_some()
    }
}

/// Bounded audit log.
pub struct AuditLog {
    /// Log entries (newest first)
    entries: Arc<RwLock<VecDeque<AuditEntry>>>,
    config: AuditConfig,
}

impl AuditLog {
    /// Create a new audit log.
    pub fn new() -> Self {
        Self::with_config(AuditConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: AuditConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            config,
        }
    }

    /// Append an entry.
    pub async fn record(&self, entry: AuditEntry) {
        if !self.config.enabled {
            return;
        }

        let mut entries = self.entries.write().await;
        entries.push_front(entry);

        // Prune if over limit
        while entries.len() > self.config.max_entries {
            entries.pop_back();
        }
    }

    /// Get recent entries.
    pub async fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().take(limit).cloned().collect()
    }

    /// Entries for one project, newest first.
    pub async fn for_project(&self, project_id: &str) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Recent refused attempts.
    pub async fn rejections(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.is_rejection())
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
