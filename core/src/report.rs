//! Audit findings, flags and the assembled report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[default]
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// Linear-text location of a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingLocation {
    pub start: usize,
    pub end: usize,
    pub text_snippet: String,
}

/// A rule violation found in linear text. Pure value; never mutates the
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFinding {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub location: FindingLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl AuditFinding {
    pub fn new(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        start: usize,
        end: usize,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            location: FindingLocation {
                start,
                end,
                text_snippet: snippet.into(),
            },
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagType {
    InlineStyle,
    RefListEntry,
    Structural,
    #[default]
    Verification,
}

/// Document-position range a flag refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Report-level flag anchored in document-position space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationFlag {
    #[serde(rename = "type", default)]
    pub kind: FlagType,
    pub rule_id: String,
    pub message: String,
    pub anchor: Anchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub style: String,
    pub timestamp: DateTime<Utc>,
    pub flags: Vec<CitationFlag>,
    pub detected_styles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_chunks: usize,
    pub total_characters: usize,
    pub citations_found: usize,
    pub flags_detected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    IssuesFound,
    NoIssues,
}

/// Everything one audit run hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub report: AuditReport,
    pub stats: AuditStats,
    pub status: AuditStatus,
}

impl AuditOutcome {
    pub fn new(report: AuditReport, stats: AuditStats) -> Self {
        let status = if report.flags.is_empty() {
            AuditStatus::NoIssues
        } else {
            AuditStatus::IssuesFound
        };
        Self {
            report,
            stats,
            status,
        }
    }

    pub fn summary(&self) -> String {
        match self.status {
            AuditStatus::IssuesFound => format!(
                "Audit complete! Found {} citation issues.",
                self.report.flags.len()
            ),
            AuditStatus::NoIssues => "Audit complete! No citation issues found.".to_string(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.report
            .flags
            .iter()
            .any(|f| f.severity == Severity::Error)
    }
}
