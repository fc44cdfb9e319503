//! Style rule engine.
//!
//! Each citation style owns an ordered set of [`AuditRule`]s. Rules are pure
//! and independent; the engine runs them one by one and a failing rule only
//! loses its own findings.

mod apa;
mod chicago;
mod ieee;
mod mla;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::DocumentNode;
use crate::error::{AuditError, RuleError};
use crate::patterns::CharOffsets;
use crate::report::{AuditFinding, Severity};
use crate::{AuditSettings, Config, ExtraRule};

pub const UNKNOWN_STYLE: &str = "UNKNOWN_STYLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CitationStyle {
    #[serde(rename = "APA")]
    Apa,
    #[serde(rename = "MLA")]
    Mla,
    #[serde(rename = "IEEE")]
    Ieee,
    Chicago,
}

impl CitationStyle {
    pub const ALL: [CitationStyle; 4] = [
        CitationStyle::Apa,
        CitationStyle::Mla,
        CitationStyle::Ieee,
        CitationStyle::Chicago,
    ];

    /// Case-insensitive lookup on the leading word; `"apa 7th"` and
    /// `"Chicago author-date"` are accepted, `"Harvard (not APA)"` is not.
    pub fn parse(name: &str) -> Option<Self> {
        let leading = name
            .split(|c: char| !c.is_alphanumeric())
            .find(|word| !word.is_empty())?;
        Self::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(leading))
    }

    pub fn name(self) -> &'static str {
        match self {
            CitationStyle::Apa => "APA",
            CitationStyle::Mla => "MLA",
            CitationStyle::Ieee => "IEEE",
            CitationStyle::Chicago => "Chicago",
        }
    }
}

impl std::fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One style concern.
pub trait AuditRule: Send + Sync {
    fn id(&self) -> &str;
    fn description(&self) -> &str;
    /// Hint describing the form this style expects instead.
    fn expected(&self) -> &str {
        ""
    }
    /// Findings over `flat_text`, located by character offsets into it.
    fn validate(
        &self,
        content: &DocumentNode,
        flat_text: &str,
    ) -> Result<Vec<AuditFinding>, RuleError>;
}

/// Extra predicate a regex match must satisfy.
pub type Guard = fn(&Captures<'_>) -> bool;

pub enum Suggestion {
    None,
    Fixed(String),
    Rewrite(fn(&Captures<'_>) -> String),
}

/// Regex-driven rule: every (guarded) match is one finding.
pub struct PatternRule {
    id: String,
    description: String,
    code: String,
    message: String,
    severity: Severity,
    expected: String,
    regex: Regex,
    guard: Option<Guard>,
    suggestion: Suggestion,
    max_input: usize,
}

impl PatternRule {
    pub fn new(id: &str, code: &str, regex: Regex) -> Self {
        Self {
            id: id.to_string(),
            description: String::new(),
            code: code.to_string(),
            message: String::new(),
            severity: Severity::Error,
            expected: String::new(),
            regex,
            guard: None,
            suggestion: Suggestion::None,
            max_input: usize::MAX,
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn expect(mut self, expected: &str) -> Self {
        self.expected = expected.to_string();
        self
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn suggest(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn limit(mut self, max_input: usize) -> Self {
        self.max_input = max_input;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn from_extra(rule: &ExtraRule, max_input: usize) -> Result<Self, AuditError> {
        let regex = Regex::new(&rule.pattern).map_err(|source| AuditError::InvalidPattern {
            id: rule.id.clone(),
            source,
        })?;
        let suggestion = match &rule.suggestion {
            Some(text) => Suggestion::Fixed(text.clone()),
            None => Suggestion::None,
        };
        Ok(PatternRule::new(&rule.id, &rule.code, regex)
            .describe(&rule.message)
            .message(&rule.message)
            .severity(rule.severity)
            .expect(rule.expected.as_deref().unwrap_or(""))
            .suggest(suggestion)
            .limit(max_input))
    }
}

impl AuditRule for PatternRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn expected(&self) -> &str {
        &self.expected
    }

    fn validate(
        &self,
        _content: &DocumentNode,
        flat_text: &str,
    ) -> Result<Vec<AuditFinding>, RuleError> {
        let len = flat_text.chars().count();
        if len > self.max_input {
            return Err(RuleError::InputTooLarge {
                len,
                limit: self.max_input,
            });
        }

        let chars = CharOffsets::new(flat_text);
        let mut findings = Vec::new();
        for caps in self.regex.captures_iter(flat_text) {
            if let Some(guard) = self.guard {
                if !guard(&caps) {
                    continue;
                }
            }
            let Some(m) = caps.get(0) else { continue };
            let suggestion = match &self.suggestion {
                Suggestion::None => None,
                Suggestion::Fixed(text) => Some(text.clone()),
                Suggestion::Rewrite(rewrite) => Some(rewrite(&caps)),
            };
            findings.push(
                AuditFinding::new(
                    self.severity,
                    &self.code,
                    &self.message,
                    chars.char_index(m.start()),
                    chars.char_index(m.end()),
                    m.as_str(),
                )
                .with_suggestion(suggestion),
            );
        }
        Ok(findings)
    }
}

/// First finding for a single citation plus the rule's expected-form hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub finding: AuditFinding,
    pub expected: String,
}

/// Rule sets keyed by style.
pub struct RuleEngine {
    sets: HashMap<CitationStyle, Vec<Box<dyn AuditRule>>>,
}

impl RuleEngine {
    pub fn new(config: &Config) -> Result<Self, AuditError> {
        let mut sets = HashMap::new();
        for style in CitationStyle::ALL {
            sets.insert(style, builtin_rules(style, &config.audit));
        }
        for extra in &config.extra_rules {
            let style =
                CitationStyle::parse(&extra.style).ok_or_else(|| AuditError::UnknownRuleStyle {
                    id: extra.id.clone(),
                    style: extra.style.clone(),
                })?;
            let rule = PatternRule::from_extra(extra, config.audit.max_rule_input)?;
            sets.entry(style)
                .or_insert_with(Vec::new)
                .push(Box::new(rule) as Box<dyn AuditRule>);
        }
        Ok(Self { sets })
    }

    pub fn rules_for(&self, style: CitationStyle) -> &[Box<dyn AuditRule>] {
        self.sets.get(&style).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Run every rule of `style` over the flattened text. An unrecognised
    /// style yields a single `UNKNOWN_STYLE` warning.
    pub fn validate_document(
        &self,
        style: &str,
        content: &DocumentNode,
        flat_text: &str,
    ) -> Vec<AuditFinding> {
        let Some(parsed) = CitationStyle::parse(style) else {
            return vec![unknown_style(style)];
        };
        let mut findings = Vec::new();
        for rule in self.rules_for(parsed) {
            match rule.validate(content, flat_text) {
                Ok(found) => findings.extend(found),
                Err(err) => warn!(rule = rule.id(), error = %err, "rule failed; skipping"),
            }
        }
        debug!(style = %parsed, findings = findings.len(), "validated document");
        findings
    }

    /// Check one citation's text; the first rule with a finding wins.
    pub fn check_citation(
        &self,
        style: CitationStyle,
        content: &DocumentNode,
        citation: &str,
    ) -> Option<RuleHit> {
        for rule in self.rules_for(style) {
            match rule.validate(content, citation) {
                Ok(found) => {
                    if let Some(finding) = found.into_iter().next() {
                        return Some(RuleHit {
                            finding,
                            expected: rule.expected().to_string(),
                        });
                    }
                }
                Err(err) => warn!(rule = rule.id(), error = %err, "rule failed; skipping"),
            }
        }
        None
    }
}

static NUMERIC_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\d+(?:[\s,\-]+\d+)*\s*\]").expect("numeric bracket rule regex"));

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year rule regex"));

/// Numeric bracket rule shared by the parenthetical styles.
fn numeric_rule(id: &str, code: &str, message: &str, fix: &str, expected: &str) -> PatternRule {
    PatternRule::new(id, code, (*NUMERIC_BRACKET).clone())
        .describe("Numeric bracket citations")
        .message(message)
        .suggest(Suggestion::Fixed(fix.to_string()))
        .expect(expected)
}

fn contains_year(text: &str) -> bool {
    YEAR.is_match(text)
}

pub fn unknown_style(style: &str) -> AuditFinding {
    AuditFinding::new(
        Severity::Warning,
        UNKNOWN_STYLE,
        format!("No rule set for citation style `{style}`; style checks were skipped."),
        0,
        0,
        "",
    )
}

fn builtin_rules(style: CitationStyle, settings: &AuditSettings) -> Vec<Box<dyn AuditRule>> {
    let rules = match style {
        CitationStyle::Apa => apa::rules(),
        CitationStyle::Mla => mla::rules(),
        CitationStyle::Ieee => ieee::rules(),
        CitationStyle::Chicago => chicago::rules(settings.chicago_variant),
    };
    rules
        .into_iter()
        .map(|rule| Box::new(rule.limit(settings.max_rule_input)) as Box<dyn AuditRule>)
        .collect()
}
