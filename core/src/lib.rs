//! Citation audit engine.
//! Detects inline citation markers in an editor document tree, checks them
//! against a citation style's rules, matches them to the document's own
//! bibliography and reports the issues found.

pub mod audit;
pub mod document;
pub mod error;
pub mod library;
pub mod matcher;
pub mod normalize;
pub mod patterns;
pub mod position;
pub mod references;
pub mod report;
pub mod rules;
pub mod verify;

use serde::{Deserialize, Serialize};

pub use audit::{document_stats, validate_for_audit, AuditOutcome, Auditor, DocumentStats};
pub use document::DocumentNode;
pub use error::{AuditError, LibraryError, NormalizeError, RuleError, VerifyError};
pub use normalize::{apply_replacements, NormalizationResult, Normalizer};
pub use patterns::{extract_patterns, CitationCandidate, PatternType};
pub use position::{map_document, MappedDocument};
pub use references::{build_index, parse_reference, ReferenceIndex, ReferenceRecord};
pub use report::{AuditFinding, AuditReport, AuditStats, CitationFlag, FlagType, Severity};
pub use rules::{CitationStyle, RuleEngine};
pub use verify::CitationVerifier;

/// Matching thresholds for candidate scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub threshold: f64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: matcher::MATCH_THRESHOLD,
        }
    }
}

/// How the bibliography section is recognised and which entries count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
    /// Heading texts (case-insensitive) that open a bibliography.
    pub headings: Vec<String>,
    /// Entries at or below this many characters are treated as noise.
    pub min_entry_length: usize,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            headings: vec![
                "references".into(),
                "works cited".into(),
                "bibliography".into(),
                "reference list".into(),
                "cited works".into(),
            ],
            min_entry_length: 20,
        }
    }
}

/// Chicago has two inline systems with different rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChicagoVariant {
    #[default]
    NotesBibliography,
    AuthorDate,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Characters per reporting chunk.
    pub chunk_size: usize,
    /// Call the verification collaborator for clean citations.
    pub verify: bool,
    pub chicago_variant: ChicagoVariant,
    /// Pattern rules refuse to scan texts longer than this many characters.
    pub max_rule_input: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            chunk_size: audit::CHUNK_SIZE,
            verify: true,
            chicago_variant: ChicagoVariant::default(),
            max_rule_input: 2_000_000,
        }
    }
}

/// User-supplied pattern rule appended to one style's rule set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExtraRule {
    pub style: String,
    pub id: String,
    pub code: String,
    pub pattern: String,
    pub message: String,
    pub severity: Severity,
    pub suggestion: Option<String>,
    pub expected: Option<String>,
}

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub matching: MatchSettings,
    pub references: ReferenceSettings,
    pub audit: AuditSettings,
    pub extra_rules: Vec<ExtraRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "audit:\n  chunk_size: 250\nreferences:\n  headings: [\"sources\"]\n",
        )
        .unwrap();
        assert_eq!(cfg.audit.chunk_size, 250);
        assert!(cfg.audit.verify);
        assert_eq!(cfg.references.headings, vec!["sources".to_string()]);
        assert_eq!(cfg.references.min_entry_length, 20);
        assert_eq!(cfg.matching.threshold, 0.8);
    }

    #[test]
    fn parses_extra_rules() {
        let cfg: Config = serde_yaml::from_str(
            r#"
audit:
  chicago_variant: author-date
extra_rules:
  - style: apa
    id: apa-ibid
    code: APA_IBID
    pattern: "\\bibid\\."
    message: APA does not use ibid.
    severity: warning
"#,
        )
        .unwrap();
        assert_eq!(cfg.audit.chicago_variant, ChicagoVariant::AuthorDate);
        assert_eq!(cfg.extra_rules.len(), 1);
        assert_eq!(cfg.extra_rules[0].severity, Severity::Warning);
    }
}
