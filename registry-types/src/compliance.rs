//! Compliance battery results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Outcome of a single named compliance sub-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SubTestResult {
    /// Name of the check, e.g. "Check GIS Integrity"
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Confidence score (0 - 100)
    pub score: u8,
    /// Problems found; never empty for a failed check
    pub issues: Vec<String>,
}

impl SubTestResult {
    /// A passing sub-test.
    pub fn pass(name: impl Into<String>, score: u8) -> Self {
        Self {
            name: name.into(),
            passed: true,
            score: score.min(100),
            issues: Vec::new(),
        }
    }

    /// A failing sub-test. An empty issue list gets a generic entry.
    pub fn fail(name: impl Into<String>, score: u8, issues: Vec<String>) -> Self {
        let issues = if issues.is_empty() {
            vec!["check failed without details".to_string()]
        } else {
            issues
        };
        Self {
            name: name.into(),
            passed: false,
            score: score.min(100),
            issues,
        }
    }
}

/// A recorded run of the compliance battery.
///
/// Immutable once recorded; a re-run produces a new result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ComplianceCheckResult {
    /// Unique result ID
    pub id: String,
    /// Project the battery ran against
    pub project_id: String,
    /// Evidence revision captured when the run started
    pub evidence_revision: u64,
    /// Last evidence update covered by the snapshot
    pub evidence_snapshot_at: Option<DateTime<Utc>>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When every sub-test had finished
    pub completed_at: DateTime<Utc>,
    /// Sub-test outcomes in battery order
    pub sub_tests: Vec<SubTestResult>,
}

impl ComplianceCheckResult {
    /// Aggregate verdict: every sub-test must pass. An empty battery fails.
    pub fn passed(&self) -> bool {
        !self.sub_tests.is_empty() && self.sub_tests.iter().all(|t| t.passed)
    }

    /// Names of the failing sub-tests, in battery order.
    pub fn failed_checks(&self) -> Vec<&str> {
        self.sub_tests
            .iter()
            .filter(|t| !t.passed)
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Mean sub-test score, rounded down.
    pub fn overall_score(&self) -> u8 {
        if self.sub_tests.is_empty() {
            return 0;
        }
        let total: u32 = self.sub_tests.iter().map(|t| t.score as u32).sum();
        (total / self.sub_tests.len() as u32) as u8
    }

    /// Whether the result covers the given evidence revision.
    pub fn is_current_for(&self, evidence_revision: u64) -> bool {
        self.evidence_revision >= evidence_revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(sub_tests: Vec<SubTestResult>) -> ComplianceCheckResult {
        let now = Utc::now();
        ComplianceCheckResult {
            id: "r-1".to_string(),
            project_id: "NCCR-2024-001".to_string(),
            evidence_revision: 3,
            evidence_snapshot_at: Some(now),
            started_at: now,
            completed_at: now,
            sub_tests,
        }
    }

    #[test]
    fn test_verdict_is_all_or_nothing() {
        let result = result_with(vec![
            SubTestResult::pass("Check GIS Integrity", 96),
            SubTestResult::pass("Expert Data Cross-check", 90),
            SubTestResult::pass("AI Authenticity Test", 88),
            SubTestResult::fail("Verify Panchayat Updates", 40, vec!["GPS mismatch".to_string()]),
        ]);
        assert!(!result.passed());
        assert_eq!(result.failed_checks(), vec!["Verify Panchayat Updates"]);
        assert_eq!(result.overall_score(), 78);
    }

    #[test]
    fn test_empty_battery_fails() {
        assert!(!result_with(vec![]).passed());
        assert_eq!(result_with(vec![]).overall_score(), 0);
    }

    #[test]
    fn test_failed_subtest_always_has_issue() {
        let failed = SubTestResult::fail("AI Authenticity Test", 10, vec![]);
        assert_eq!(failed.issues.len(), 1);
        assert_eq!(SubTestResult::pass("x", 250).score, 100);
    }

    #[test]
    fn test_currency_against_revision() {
        let result = result_with(vec![SubTestResult::pass("x", 100)]);
        assert!(result.is_current_for(3));
        assert!(!result.is_current_for(4));
    }
}
