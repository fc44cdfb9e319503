//! Audit orchestration.
//!
//! One call to [`Auditor::run_audit`] walks the phases
//! `idle -> extracting -> validating -> (verifying) -> done`. Every piece of
//! state lives on the stack of that call, so audits of different documents
//! can run concurrently on one [`Auditor`].

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::document::DocumentNode;
use crate::error::AuditError;
use crate::patterns::{detect_citation_forms, CitationForm};
use crate::position::{map_document, MappedDocument, SectionKind};
use crate::report::{Anchor, AuditReport, AuditStats, CitationFlag, FlagType};
use crate::rules::{unknown_style, CitationStyle, RuleEngine};
use crate::verify::{CitationVerifier, VerificationCitation, VerificationRequest};
use crate::{Config, ReferenceSettings};

pub use crate::report::AuditOutcome;

/// Characters per reporting chunk.
pub const CHUNK_SIZE: usize = 500;

const MIN_AUDIT_WORDS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPhase {
    Idle,
    Extracting,
    Validating,
    Verifying,
    Done,
}

/// A citation found in the body, in document positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedCitation {
    pub form: CitationForm,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub section: Option<String>,
}

pub struct Auditor {
    config: Config,
    rules: RuleEngine,
}

impl Auditor {
    /// Compile the rule sets. Invalid extra rules fail here, never mid-audit.
    pub fn new(config: Config) -> Result<Self, AuditError> {
        if config.audit.chunk_size == 0 {
            return Err(AuditError::ZeroChunkSize);
        }
        let rules = RuleEngine::new(&config)?;
        Ok(Self { config, rules })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Map the document and collect every citation outside the bibliography.
    ///
    /// Regex forms are classified against the whole linear text; a match
    /// whose characters are not contiguous in the document (it straddles a
    /// block boundary or an atom) is discarded. Structured citations are
    /// reported as [`CitationForm::Normalized`] and win over any regex match
    /// they overlap.
    pub fn extract(&self, root: &DocumentNode) -> (MappedDocument, Vec<DetectedCitation>) {
        let mapped = map_document(root, &self.config.references.headings);
        let mut citations = Vec::new();

        for found in detect_citation_forms(&mapped.full_text) {
            let section = mapped.section_at(found.span.start);
            if section.is_some_and(|s| s.kind == SectionKind::Reference) {
                continue;
            }
            let Some((start, end)) = mapped.document_range(found.span.start, found.span.end)
            else {
                debug!(text = %found.text, "citation crosses a block boundary; skipped");
                continue;
            };
            if mapped
                .structured
                .iter()
                .any(|s| start < s.end_position && s.position < end)
            {
                continue;
            }
            citations.push(DetectedCitation {
                form: found.form,
                text: found.text,
                start,
                end,
                section: section.map(|s| s.title.clone()),
            });
        }

        for structured in &mapped.structured {
            let section = mapped
                .sections
                .iter()
                .find(|s| structured.position >= s.start && structured.position < s.end);
            if section.is_some_and(|s| s.kind == SectionKind::Reference) {
                continue;
            }
            citations.push(DetectedCitation {
                form: CitationForm::Normalized,
                text: structured.text.clone(),
                start: structured.position,
                end: structured.end_position,
                section: section.map(|s| s.title.clone()),
            });
        }

        citations.sort_by_key(|c| (c.start, c.end));
        debug!(
            characters = mapped.char_len(),
            citations = citations.len(),
            sections = mapped.sections.len(),
            "extracted citations"
        );
        (mapped, citations)
    }

    /// Audit `root` against `style`. The verifier, when present and enabled,
    /// is called once with every citation that passed the style checks; its
    /// failure only costs its own flags.
    pub async fn run_audit(
        &self,
        root: &DocumentNode,
        style: &str,
        verifier: Option<&dyn CitationVerifier>,
    ) -> AuditOutcome {
        let mut phase = AuditPhase::Idle;
        advance(&mut phase, AuditPhase::Extracting);
        let (mapped, citations) = self.extract(root);

        advance(&mut phase, AuditPhase::Validating);
        let parsed = CitationStyle::parse(style);
        let mut flags = Vec::new();
        let mut flagged: HashSet<(usize, usize)> = HashSet::new();

        match parsed {
            None => {
                let finding = unknown_style(style);
                warn!(style, "unknown citation style; style checks skipped");
                flags.push(CitationFlag {
                    kind: FlagType::Structural,
                    rule_id: finding.code,
                    message: finding.message,
                    anchor: Anchor {
                        start: 0,
                        end: 0,
                        text: String::new(),
                    },
                    section: None,
                    expected: String::new(),
                    severity: finding.severity,
                });
            }
            Some(parsed) => {
                for citation in &citations {
                    if citation.form == CitationForm::Normalized {
                        continue;
                    }
                    let Some(hit) = self.rules.check_citation(parsed, root, &citation.text) else {
                        continue;
                    };
                    flagged.insert((citation.start, citation.end));
                    let finding = hit.finding;
                    flags.push(CitationFlag {
                        kind: FlagType::InlineStyle,
                        rule_id: finding.code,
                        message: finding.message,
                        anchor: Anchor {
                            start: citation.start + units(&citation.text, finding.location.start),
                            end: citation.start + units(&citation.text, finding.location.end),
                            text: finding.location.text_snippet,
                        },
                        section: citation.section.clone(),
                        expected: hit.expected,
                        severity: finding.severity,
                    });
                }
            }
        }

        let clean: Vec<&DetectedCitation> = citations
            .iter()
            .filter(|c| !flagged.contains(&(c.start, c.end)))
            .collect();

        match verifier {
            Some(verifier) if self.config.audit.verify && !clean.is_empty() => {
                advance(&mut phase, AuditPhase::Verifying);
                let request = VerificationRequest {
                    citations: clean
                        .iter()
                        .map(|c| VerificationCitation {
                            text: c.text.clone(),
                            position: c.start,
                            end_position: c.end,
                        })
                        .collect(),
                };
                match verifier.verify(request).await {
                    Ok(response) => merge_verification(&mut flags, &flagged, response.flags),
                    Err(err) => warn!(error = %err, "verification failed; continuing without it"),
                }
            }
            _ => debug!(clean = clean.len(), "verification skipped"),
        }

        let detected_styles = detected_styles(&citations);
        let total_characters = mapped.char_len();
        let chunk_size = self.config.audit.chunk_size.max(1);
        let stats = AuditStats {
            total_chunks: total_characters.div_ceil(chunk_size),
            total_characters,
            citations_found: citations.len(),
            flags_detected: flags.len(),
        };

        let report = AuditReport {
            style: parsed.map(|s| s.name().to_string()).unwrap_or_else(|| style.to_string()),
            timestamp: Utc::now(),
            flags,
            detected_styles,
        };
        advance(&mut phase, AuditPhase::Done);
        let outcome = AuditOutcome::new(report, stats);
        info!(
            style = %outcome.report.style,
            citations = stats.citations_found,
            flags = stats.flags_detected,
            chunks = stats.total_chunks,
            "{}",
            outcome.summary()
        );
        outcome
    }
}

fn advance(phase: &mut AuditPhase, next: AuditPhase) {
    debug!(from = ?*phase, to = ?next, "audit phase");
    *phase = next;
}

/// UTF-16 width of the first `chars` characters of `text`.
fn units(text: &str, chars: usize) -> usize {
    text.chars().take(chars).map(char::len_utf16).sum()
}

/// Append verifier flags, dropping any anchored on a style-flagged range.
fn merge_verification(
    flags: &mut Vec<CitationFlag>,
    flagged: &HashSet<(usize, usize)>,
    incoming: Vec<CitationFlag>,
) {
    let styled: HashSet<(usize, usize)> = flags
        .iter()
        .map(|f| (f.anchor.start, f.anchor.end))
        .chain(flagged.iter().copied())
        .collect();
    let before = flags.len();
    for mut flag in incoming {
        if styled.contains(&(flag.anchor.start, flag.anchor.end)) {
            continue;
        }
        flag.kind = FlagType::Verification;
        flags.push(flag);
    }
    debug!(added = flags.len() - before, "merged verification flags");
}

/// Citation form labels in first-seen order.
fn detected_styles(citations: &[DetectedCitation]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in citations.iter().filter_map(|c| c.form.label()) {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub word_count: usize,
    pub character_count: usize,
    pub citation_count: usize,
    pub section_count: usize,
}

pub fn document_stats(root: &DocumentNode, settings: &ReferenceSettings) -> DocumentStats {
    let mapped = map_document(root, &settings.headings);
    stats_for(&mapped)
}

fn stats_for(mapped: &MappedDocument) -> DocumentStats {
    let word_count = mapped
        .runs
        .iter()
        .map(|run| mapped.slice(run.text_start, run.text_end).unicode_words().count())
        .sum();
    DocumentStats {
        word_count,
        character_count: mapped.char_len(),
        citation_count: detect_citation_forms(&mapped.full_text).len() + mapped.structured.len(),
        section_count: mapped.sections.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReadiness {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// Structural checks before an audit is worth running.
pub fn validate_for_audit(root: &DocumentNode, settings: &ReferenceSettings) -> AuditReadiness {
    if root.children().is_empty() {
        return AuditReadiness {
            is_valid: false,
            issues: vec!["Document is empty".into()],
        };
    }

    let mapped = map_document(root, &settings.headings);
    let stats = stats_for(&mapped);
    let mut issues = Vec::new();
    if stats.word_count < MIN_AUDIT_WORDS {
        issues.push("Document is too short for meaningful citation analysis".to_string());
    }
    if stats.citation_count == 0 {
        issues.push("No citations found in document".to_string());
    }
    if mapped.reference_start().is_none() {
        issues.push("No reference/bibliography section found".to_string());
    }
    AuditReadiness {
        is_valid: issues.is_empty(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> DocumentNode {
        DocumentNode::doc(vec![
            DocumentNode::paragraph(vec![DocumentNode::text(body)]),
            DocumentNode::heading(1, vec![DocumentNode::text("References")]),
            DocumentNode::paragraph(vec![DocumentNode::text(
                "Smith, J. (2020). A study of things. Journal.",
            )]),
        ])
    }

    fn auditor() -> Auditor {
        Auditor::new(Config::default()).unwrap()
    }

    #[test]
    fn extract_skips_bibliography() {
        let (_, citations) = auditor().extract(&doc("Shown (Smith, 2020) and [2]."));
        let texts: Vec<_> = citations.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["(Smith, 2020)", "[2]"]);
        assert_eq!(citations[0].start, 7);
        assert_eq!(citations[0].section.as_deref(), Some("Introduction"));
    }

    #[test]
    fn extract_drops_matches_across_blocks() {
        let root = DocumentNode::doc(vec![
            DocumentNode::paragraph(vec![DocumentNode::text("end of one (Smith,")]),
            DocumentNode::paragraph(vec![DocumentNode::text(" 2020) next")]),
        ]);
        let (mapped, citations) = auditor().extract(&root);
        assert!(mapped.full_text.contains("(Smith, 2020)"));
        assert!(citations.is_empty());
    }

    #[test]
    fn detected_styles_keep_first_seen_order() {
        let (_, citations) =
            auditor().extract(&doc("A (Jones 45). B [1]. C (Smith, 2020). D [2]."));
        assert_eq!(
            detected_styles(&citations),
            vec!["Author-Page", "Numeric", "Author-Year"]
        );
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = Config::default();
        config.audit.chunk_size = 0;
        assert!(matches!(Auditor::new(config), Err(AuditError::ZeroChunkSize)));
    }

    #[test]
    fn stats_count_words_per_block() {
        let root = DocumentNode::doc(vec![
            DocumentNode::paragraph(vec![DocumentNode::text("One two.")]),
            DocumentNode::paragraph(vec![DocumentNode::text("Three [1].")]),
        ]);
        let stats = document_stats(&root, &ReferenceSettings::default());
        assert_eq!(stats.word_count, 4);
        assert_eq!(stats.character_count, 18);
        assert_eq!(stats.citation_count, 1);
        assert_eq!(stats.section_count, 1);
    }

    #[test]
    fn readiness_reports_each_gap() {
        let settings = ReferenceSettings::default();
        let empty = validate_for_audit(&DocumentNode::doc(Vec::new()), &settings);
        assert_eq!(empty.issues, vec!["Document is empty".to_string()]);

        let short = validate_for_audit(
            &DocumentNode::doc(vec![DocumentNode::paragraph(vec![DocumentNode::text(
                "Just a few words.",
            )])]),
            &settings,
        );
        assert!(!short.is_valid);
        assert_eq!(short.issues.len(), 3);

        let body = format!("{} (Smith, 2020).", "word ".repeat(120));
        let ready = validate_for_audit(&doc(&body), &settings);
        assert!(ready.is_valid, "{:?}", ready.issues);
    }
}
