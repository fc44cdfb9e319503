//! Regex-based citation signal detection.
//!
//! The extractor is stateless: it scans one text window and reports every
//! match of every pattern family with offsets relative to a caller-supplied
//! base. Matches may overlap across families; consumers resolve overlaps
//! with an [`OverlapPolicy`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Citation signal families recognised by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternType {
    /// `[1]`, `[1, 2]`, `[1-3]`
    #[serde(rename = "NUMERIC_BRACKET")]
    NumericBracket,
    /// `(Smith, 2020)`, `(Smith et al., 2020a)`
    #[serde(rename = "AUTHOR_YEAR")]
    AuthorYear,
    /// `(Smith 24)`, `(Smith, 24-26)`
    #[serde(rename = "AUTHOR_PAGE")]
    AuthorPage,
    /// `et al` without the abbreviation period
    #[serde(rename = "et_al_no_period")]
    EtAlNoPeriod,
    /// `et al.`
    #[serde(rename = "et_al_with_period")]
    EtAlWithPeriod,
    /// `(Smith & Jones ...)`
    #[serde(rename = "AMPERSAND_IN_PAREN")]
    AmpersandInParen,
    /// `(Smith and Jones ...)`
    #[serde(rename = "AND_IN_PAREN")]
    AndInParen,
}

impl PatternType {
    pub const ALL: [PatternType; 7] = [
        PatternType::NumericBracket,
        PatternType::AuthorYear,
        PatternType::AuthorPage,
        PatternType::EtAlNoPeriod,
        PatternType::EtAlWithPeriod,
        PatternType::AmpersandInParen,
        PatternType::AndInParen,
    ];

    /// Whether candidates of this family may name an author and a year.
    pub fn is_parenthetical(self) -> bool {
        matches!(
            self,
            PatternType::AuthorYear
                | PatternType::AuthorPage
                | PatternType::AmpersandInParen
                | PatternType::AndInParen
        )
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PatternType::NumericBracket => "NUMERIC_BRACKET",
            PatternType::AuthorYear => "AUTHOR_YEAR",
            PatternType::AuthorPage => "AUTHOR_PAGE",
            PatternType::EtAlNoPeriod => "et_al_no_period",
            PatternType::EtAlWithPeriod => "et_al_with_period",
            PatternType::AmpersandInParen => "AMPERSAND_IN_PAREN",
            PatternType::AndInParen => "AND_IN_PAREN",
        };
        f.write_str(name)
    }
}

/// Half-open character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A detected text span that looks like an inline citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationCandidate {
    pub text: String,
    pub span: Span,
    pub pattern_type: PatternType,
    pub year: Option<i32>,
    pub authors: Vec<String>,
    pub is_ambiguous: bool,
    /// Sentence surrounding the match.
    pub context: String,
}

impl CitationCandidate {
    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn end(&self) -> usize {
        self.span.end
    }
}

/// Overlap resolution strategy applied to a candidate list.
pub type OverlapPolicy = fn(Vec<CitationCandidate>) -> Vec<CitationCandidate>;

/// Keep the longest candidate among intersecting ones; ties go to the
/// candidate seen first. The result is ordered by start offset.
pub fn longest_span_wins(candidates: Vec<CitationCandidate>) -> Vec<CitationCandidate> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].span.len().cmp(&candidates[a].span.len()));

    let mut kept: Vec<usize> = Vec::new();
    for idx in order {
        let span = candidates[idx].span;
        if kept.iter().all(|&k| !candidates[k].span.overlaps(&span)) {
            kept.push(idx);
        }
    }
    kept.sort_by_key(|&k| (candidates[k].span.start, k));

    let mut slots: Vec<Option<CitationCandidate>> = candidates.into_iter().map(Some).collect();
    kept.into_iter().filter_map(|k| slots[k].take()).collect()
}

static NUMERIC_BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\d+(?:[\s,\-]+\d+)*\s*\]").expect("numeric bracket regex"));

static AUTHOR_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([A-Z][^()]*?,?\s+(?:19|20)\d{2}[a-z]?\)").expect("author-year regex")
});

static AUTHOR_PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([A-Z][A-Za-z\s.'\-]+(?:,\s+)?\d+(?:-\d+)?\)").expect("author-page regex")
});

static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bet\s+al\b(\.)?").expect("et al regex"));

static AMPERSAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*[A-Z][a-z]+\s+&\s+[A-Z][a-z]+[^()]*\)").expect("ampersand regex")
});

static AND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*[A-Z][a-z]+\s+and\s+[A-Z][a-z]+[^()]*\)").expect("and regex")
});

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})[a-z]?\b").expect("year regex"));

static ET_AL_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bet\s+al\b\.?").expect("et al split regex"));

static AUTHOR_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:&|\band\b)\s*").expect("author split regex"));

/// Byte-to-character offset translation for one text window.
pub(crate) struct CharOffsets {
    boundaries: Vec<usize>,
}

impl CharOffsets {
    pub(crate) fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    pub(crate) fn char_index(&self, byte: usize) -> usize {
        match self.boundaries.binary_search(&byte) {
            Ok(idx) | Err(idx) => idx,
        }
    }
}

/// Extract every citation signal in `text`; offsets are character indices
/// shifted by `offset`.
pub fn extract_patterns(text: &str, offset: usize) -> Vec<CitationCandidate> {
    let chars = CharOffsets::new(text);
    let mut found = Vec::new();
    let mut author_year_spans: Vec<(usize, usize)> = Vec::new();

    for pattern in PatternType::ALL {
        match pattern {
            PatternType::EtAlNoPeriod | PatternType::EtAlWithPeriod => {
                for caps in ET_AL_RE.captures_iter(text) {
                    let with_period = caps.get(1).is_some();
                    if with_period != (pattern == PatternType::EtAlWithPeriod) {
                        continue;
                    }
                    let Some(m) = caps.get(0) else { continue };
                    found.push(candidate(text, &chars, offset, pattern, m.start(), m.end()));
                }
            }
            _ => {
                let regex = match pattern {
                    PatternType::NumericBracket => &NUMERIC_BRACKET_RE,
                    PatternType::AuthorYear => &AUTHOR_YEAR_RE,
                    PatternType::AuthorPage => &AUTHOR_PAGE_RE,
                    PatternType::AmpersandInParen => &AMPERSAND_RE,
                    _ => &AND_RE,
                };
                for m in regex.find_iter(text) {
                    if pattern == PatternType::AuthorYear {
                        author_year_spans.push((m.start(), m.end()));
                    }
                    if pattern == PatternType::AuthorPage
                        && author_year_spans
                            .iter()
                            .any(|&(s, e)| m.start() < e && s < m.end())
                    {
                        continue;
                    }
                    found.push(candidate(text, &chars, offset, pattern, m.start(), m.end()));
                }
            }
        }
    }

    found
}

fn candidate(
    text: &str,
    chars: &CharOffsets,
    offset: usize,
    pattern: PatternType,
    start: usize,
    end: usize,
) -> CitationCandidate {
    let matched = &text[start..end];
    let (year, authors) = if pattern.is_parenthetical() {
        parse_parenthetical(matched)
    } else {
        (None, Vec::new())
    };
    CitationCandidate {
        text: matched.to_string(),
        span: Span {
            start: offset + chars.char_index(start),
            end: offset + chars.char_index(end),
        },
        pattern_type: pattern,
        year,
        is_ambiguous: pattern.is_parenthetical() && matched.contains(';'),
        authors,
        context: sentence_around(text, start, end),
    }
}

/// Pull the year and author names out of a parenthetical citation, e.g.
/// `(Johnson & Lee, 2021)` gives `2021` and `["Johnson", "Lee"]`.
pub fn parse_parenthetical(text: &str) -> (Option<i32>, Vec<String>) {
    let inner = text.trim_start_matches('(').trim_end_matches(')');
    let Some(caps) = YEAR_RE.captures(inner) else {
        return (None, Vec::new());
    };
    let year = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
    let Some(whole) = caps.get(0) else {
        return (year, Vec::new());
    };

    let mut author_text = inner[..whole.start()].replace(',', " ");
    if let Some(m) = ET_AL_SPLIT_RE.find(&author_text) {
        author_text.truncate(m.start());
    }
    let authors = AUTHOR_SPLIT_RE
        .split(author_text.trim())
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect();
    (year, authors)
}

/// Sentence containing the byte range `start..end` of `text`.
fn sentence_around(text: &str, start: usize, end: usize) -> String {
    let before = &text[..start];
    let mut sentence_start = 0;
    let mut prev: Option<char> = None;
    for (idx, ch) in before.char_indices() {
        if ch.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            sentence_start = idx;
        }
        prev = Some(ch);
    }
    let sentence_end = text[end..]
        .find(|c: char| matches!(c, '.' | '!' | '?'))
        .map(|i| end + i + 1)
        .unwrap_or(text.len());
    text[sentence_start..sentence_end].trim().to_string()
}

/// Citation form used for style checks and mixed-style reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationForm {
    Numeric,
    AuthorYear,
    AuthorPage,
    /// Already a structured citation in the document.
    Normalized,
}

impl CitationForm {
    /// Label used in the report's detected styles.
    pub fn label(self) -> Option<&'static str> {
        match self {
            CitationForm::Numeric => Some("Numeric"),
            CitationForm::AuthorYear => Some("Author-Year"),
            CitationForm::AuthorPage => Some("Author-Page"),
            CitationForm::Normalized => None,
        }
    }
}

/// A citation form match against the linear text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMatch {
    pub form: CitationForm,
    pub span: Span,
    pub text: String,
}

static FORM_NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\d+(?:[\s,\-]+\d+)*\s*\]").expect("numeric form regex"));

static FORM_AUTHOR_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*\b(?:19|20)\d{2}[a-z]?\b[^()]*\)").expect("author-year form regex")
});

static FORM_AUTHOR_PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([A-Z][\p{L}\s.&'\-]*?,?\s+\d{1,4}(?:-\d+)?\)").expect("author-page form regex")
});

/// Classify citations in `text` by the three main form families.
///
/// An author-page match that overlaps an author-year match is dropped, so a
/// span is never reported under both parenthetical forms.
pub fn detect_citation_forms(text: &str) -> Vec<FormMatch> {
    let chars = CharOffsets::new(text);
    let mut matches = Vec::new();
    let mut year_spans: Vec<(usize, usize)> = Vec::new();

    let families: [(&Lazy<Regex>, CitationForm); 3] = [
        (&FORM_NUMERIC_RE, CitationForm::Numeric),
        (&FORM_AUTHOR_YEAR_RE, CitationForm::AuthorYear),
        (&FORM_AUTHOR_PAGE_RE, CitationForm::AuthorPage),
    ];
    for (regex, form) in families {
        for m in regex.find_iter(text) {
            match form {
                CitationForm::AuthorYear => year_spans.push((m.start(), m.end())),
                CitationForm::AuthorPage
                    if year_spans.iter().any(|&(s, e)| m.start() < e && s < m.end()) =>
                {
                    continue
                }
                _ => {}
            }
            matches.push(FormMatch {
                form,
                span: Span {
                    start: chars.char_index(m.start()),
                    end: chars.char_index(m.end()),
                },
                text: m.as_str().to_string(),
            });
        }
    }
    matches
}
