use std::sync::Mutex;

use async_trait::async_trait;
use citeaudit_core::document::DocumentNode;
use citeaudit_core::matcher::{match_candidate, MATCH_THRESHOLD};
use citeaudit_core::report::{Anchor, AuditStatus};
use citeaudit_core::verify::{VerificationRequest, VerificationResponse};
use citeaudit_core::{
    apply_replacements, build_index, extract_patterns, map_document, AuditOutcome, Auditor,
    CitationFlag, CitationVerifier, Config, FlagType, Normalizer, ReferenceSettings, RuleEngine,
    VerifyError,
};

fn paper(body: &str, references: &[&str]) -> DocumentNode {
    let mut content = vec![
        DocumentNode::paragraph(vec![DocumentNode::text(body)]),
        DocumentNode::heading(1, vec![DocumentNode::text("References")]),
    ];
    content.extend(
        references
            .iter()
            .map(|r| DocumentNode::paragraph(vec![DocumentNode::text(*r)])),
    );
    DocumentNode::doc(content)
}

async fn audit_with(
    config: Config,
    root: &DocumentNode,
    style: &str,
    verifier: Option<&dyn CitationVerifier>,
) -> AuditOutcome {
    Auditor::new(config).unwrap().run_audit(root, style, verifier).await
}

async fn audit(root: &DocumentNode, style: &str) -> AuditOutcome {
    audit_with(Config::default(), root, style, None).await
}

fn codes(outcome: &AuditOutcome) -> Vec<&str> {
    outcome
        .report
        .flags
        .iter()
        .map(|f| f.rule_id.as_str())
        .collect()
}

fn assert_has(outcome: &AuditOutcome, code: &str) {
    assert!(
        outcome.report.flags.iter().any(|f| f.rule_id == code),
        "expected flag {code}, got: {:#?}",
        outcome.report.flags
    );
}

fn assert_not(outcome: &AuditOutcome, code: &str) {
    assert!(
        outcome.report.flags.iter().all(|f| f.rule_id != code),
        "expected no flag {code}, got: {:#?}",
        outcome.report.flags
    );
}

#[derive(Default)]
struct RecordingVerifier {
    requests: Mutex<Vec<VerificationRequest>>,
    flags: Vec<CitationFlag>,
    fail: bool,
}

#[async_trait]
impl CitationVerifier for RecordingVerifier {
    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationResponse, VerifyError> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(VerifyError::Transport("connection refused".into()));
        }
        Ok(VerificationResponse {
            flags: self.flags.clone(),
        })
    }
}

fn verifier_flag(start: usize, end: usize, text: &str) -> CitationFlag {
    CitationFlag {
        kind: FlagType::InlineStyle,
        rule_id: "VER.UNMATCHED_REFERENCE".into(),
        message: "No source found for this citation.".into(),
        anchor: Anchor {
            start,
            end,
            text: text.into(),
        },
        section: None,
        expected: String::new(),
        severity: Default::default(),
    }
}

#[test]
fn exact_author_year_matches_with_full_score() {
    let root = paper("", &["Smith, J. (2020). A study of things. Journal."]);
    let index = build_index(&root, &ReferenceSettings::default());
    let candidates = extract_patterns("(Smith, 2020)", 0);
    let result = match_candidate(&candidates[0], &index, MATCH_THRESHOLD).unwrap();
    assert_eq!(result.id, "smith2020");
    assert_eq!(result.score, 1.0);
}

#[tokio::test]
async fn ieee_flags_parenthetical_once_and_leaves_numeric_alone() {
    let root = paper("Prior work (Smith, 2020) and [3] agree.", &[]);
    let outcome = audit(&root, "IEEE").await;
    assert_eq!(codes(&outcome), vec!["IEEE_INVALID_PARENTHETICAL"]);
    assert!(outcome.report.flags.iter().all(|f| f.anchor.text != "[3]"));
    assert_eq!(outcome.report.flags[0].kind, FlagType::InlineStyle);
    assert_eq!(outcome.report.flags[0].expected, "[n]");
}

#[tokio::test]
async fn apa_flags_numeric_bracket_at_its_range() {
    let root = paper("As shown [1], results hold.", &[]);
    let outcome = audit(&root, "apa").await;
    assert_eq!(codes(&outcome), vec!["APA_INVALID_NUMERIC"]);

    let flag = &outcome.report.flags[0];
    let mapped = map_document(&root, &ReferenceSettings::default().headings);
    let start = mapped.full_text.find('[').unwrap();
    assert_eq!(
        mapped.document_range(start, start + 3),
        Some((flag.anchor.start, flag.anchor.end))
    );
    assert_eq!((flag.anchor.start, flag.anchor.end), (10, 13));
    assert_eq!(flag.anchor.text, "[1]");
    assert_eq!(outcome.report.style, "APA");
}

#[tokio::test]
async fn mla_end_to_end_flags_year_in_citation() {
    let root = paper(
        "Findings show improvement (Johnson & Lee, 2021).",
        &["Johnson, R., & Lee, T. (2021). Title. Journal."],
    );
    let outcome = audit(&root, "MLA").await;
    assert_eq!(codes(&outcome), vec!["MLA_YEAR_IN_CITATION"]);
    let anchor = &outcome.report.flags[0].anchor;
    assert_eq!((anchor.start, anchor.end), (27, 48));
    assert_eq!(anchor.text, "(Johnson & Lee, 2021)");
    assert_eq!(outcome.status, AuditStatus::IssuesFound);
    assert_eq!(outcome.summary(), "Audit complete! Found 1 citation issues.");
}

#[tokio::test]
async fn mla_flags_comma_between_author_and_page() {
    let root = paper("As argued (Smith, 24).", &[]);
    let outcome = audit(&root, "MLA").await;
    assert_eq!(codes(&outcome), vec!["MLA_COMMA_SEPARATOR"]);
    let anchor = &outcome.report.flags[0].anchor;
    assert_eq!((anchor.start, anchor.end), (11, 22));
    assert_eq!(anchor.text, "(Smith, 24)");
    assert_eq!(outcome.stats.citations_found, 1);
    assert_eq!(outcome.report.detected_styles, vec!["Author-Page"]);
}

#[tokio::test]
async fn ieee_flags_author_page_with_or_without_comma() {
    let outcome = audit(&paper("As argued (Smith, 24) and (Jones 45).", &[]), "IEEE").await;
    assert_eq!(codes(&outcome), vec!["IEEE_INVALID_MLA", "IEEE_INVALID_MLA"]);
    assert_eq!(outcome.report.flags[0].expected, "[n]");
}

#[tokio::test]
async fn ieee_flags_non_ascii_surnames() {
    for (body, text) in [
        ("Prior work (Müller, 2020) agrees.", "(Müller, 2020)"),
        ("Prior work (O'Brien, 2020) agrees.", "(O'Brien, 2020)"),
        ("Prior work (Smith-Jones, 2020) agrees.", "(Smith-Jones, 2020)"),
    ] {
        let outcome = audit(&paper(body, &[]), "IEEE").await;
        assert_eq!(codes(&outcome), vec!["IEEE_INVALID_PARENTHETICAL"], "{body}");
        let anchor = &outcome.report.flags[0].anchor;
        assert_eq!(anchor.text, text);
        assert_eq!(anchor.start, 12);
        assert_eq!(anchor.end, 12 + text.chars().count());
    }
}

#[tokio::test]
async fn unknown_style_is_reported_not_raised() {
    let root = paper("Claim [1].", &[]);
    let outcome = audit(&root, "Harvard").await;
    assert_eq!(codes(&outcome), vec!["UNKNOWN_STYLE"]);
    assert_eq!(outcome.report.flags[0].kind, FlagType::Structural);
    assert_eq!(outcome.report.style, "Harvard");

    let engine = RuleEngine::new(&Config::default()).unwrap();
    let findings = engine.validate_document("Harvard", &root, "Claim [1].");
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].code, "UNKNOWN_STYLE");
}

#[tokio::test]
async fn chicago_author_date_accepts_parentheticals() {
    let root = paper("Shown (Smith, 2020).", &[]);
    assert_has(&audit(&root, "Chicago").await, "CHICAGO_PARENTHETICAL_WARN");

    let mut config = Config::default();
    config.audit.chicago_variant = citeaudit_core::ChicagoVariant::AuthorDate;
    let outcome = audit_with(config, &root, "Chicago", None).await;
    assert_not(&outcome, "CHICAGO_PARENTHETICAL_WARN");
    assert_eq!(outcome.status, AuditStatus::NoIssues);
}

#[tokio::test]
async fn mixed_forms_are_reported_in_detected_styles() {
    let root = paper("First [1]. Then (Smith, 2020). Also (Jones 45).", &[]);
    let outcome = audit(&root, "APA").await;
    assert_eq!(
        outcome.report.detected_styles,
        vec!["Numeric", "Author-Year", "Author-Page"]
    );
}

#[tokio::test]
async fn stats_count_chunks_and_citations() {
    let body = format!("{} [1]", "x".repeat(1196));
    let root = DocumentNode::doc(vec![DocumentNode::paragraph(vec![DocumentNode::text(body)])]);
    let outcome = audit(&root, "IEEE").await;
    assert_eq!(outcome.stats.total_characters, 1200);
    assert_eq!(outcome.stats.total_chunks, 3);
    assert_eq!(outcome.stats.citations_found, 1);
    assert_eq!(outcome.stats.flags_detected, 0);

    let empty = audit(&DocumentNode::doc(Vec::new()), "IEEE").await;
    assert_eq!(empty.stats.total_chunks, 0);
    assert_eq!(empty.summary(), "Audit complete! No citation issues found.");
}

#[tokio::test]
async fn clean_citations_go_to_the_verifier_once() {
    let root = DocumentNode::doc(vec![DocumentNode::paragraph(vec![
        DocumentNode::text("Shown [1] and (Smith, 2020) and "),
        DocumentNode::citation("lee2019", "(Lee, 2019)"),
        DocumentNode::text("."),
    ])]);
    let verifier = RecordingVerifier {
        flags: vec![
            verifier_flag(7, 10, "[1]"),
            verifier_flag(15, 28, "(Smith, 2020)"),
        ],
        ..RecordingVerifier::default()
    };
    let outcome = audit_with(Config::default(), &root, "APA", Some(&verifier)).await;

    let requests = verifier.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let sent: Vec<_> = requests[0].citations.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(sent, vec!["(Smith, 2020)", "(Lee, 2019)"]);
    assert_eq!(requests[0].citations[0].position, 15);
    assert_eq!(requests[0].citations[1].end_position, 34);

    assert_eq!(
        codes(&outcome),
        vec!["APA_INVALID_NUMERIC", "VER.UNMATCHED_REFERENCE"]
    );
    let merged = &outcome.report.flags[1];
    assert_eq!(merged.kind, FlagType::Verification);
    assert_eq!(merged.anchor.text, "(Smith, 2020)");
}

#[tokio::test]
async fn verifier_failure_does_not_abort_the_audit() {
    let root = paper("Shown [1] and (Smith, 2020).", &[]);
    let verifier = RecordingVerifier {
        fail: true,
        ..RecordingVerifier::default()
    };
    let outcome = audit_with(Config::default(), &root, "APA", Some(&verifier)).await;
    assert_eq!(verifier.requests.lock().unwrap().len(), 1);
    assert_eq!(codes(&outcome), vec!["APA_INVALID_NUMERIC"]);
}

#[tokio::test]
async fn verifier_is_skipped_when_disabled_or_nothing_is_clean() {
    let verifier = RecordingVerifier::default();

    let mut config = Config::default();
    config.audit.verify = false;
    audit_with(config, &paper("Shown (Smith, 2020).", &[]), "APA", Some(&verifier)).await;

    audit_with(Config::default(), &paper("Shown [1].", &[]), "APA", Some(&verifier)).await;
    assert!(verifier.requests.lock().unwrap().is_empty());
}

#[test]
fn normalization_is_idempotent() {
    let mut root = paper(
        "Results (Smith, 2020) and (Johnson & Lee, 2021) hold.",
        &[
            "Smith, J. (2020). A study of things. Journal.",
            "Johnson, R., & Lee, T. (2021). Title. Journal.",
        ],
    );
    let normalizer = Normalizer::new(&Config::default());
    let first = normalizer.normalize(&root);
    assert_eq!(first.normalized_count(), 2);
    apply_replacements(&mut root, first.replacements).unwrap();

    let second = normalizer.normalize(&root);
    assert_eq!(second.normalized_count(), 0);
    assert!(second.issues.is_empty());
}

#[test]
fn typo_is_accepted_and_unrelated_author_is_an_issue() {
    let root = paper(
        "Typo (Johnso, 2021) and stranger (Smith, 2021).",
        &["Johnson, R., & Lee, T. (2021). Title. Journal."],
    );
    let result = Normalizer::new(&Config::default()).normalize(&root);
    assert_eq!(result.normalized_count(), 1);
    assert_eq!(result.replacements[0].citation_id, "johnson2021");
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].text, "(Smith, 2021)");
}
