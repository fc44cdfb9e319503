//! Bibliography discovery and reference-entry parsing.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{walk, DocumentNode, WalkEvent};
use crate::position::is_reference_heading;
use crate::ReferenceSettings;

/// A parsed bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRecord {
    /// `lowercase(first author without whitespace) + year`, e.g. `greenberg2009`.
    pub id: String,
    pub authors: Vec<String>,
    pub year: i32,
    pub raw_text: String,
    pub title: Option<String>,
}

impl ReferenceRecord {
    pub fn primary_author(&self) -> &str {
        self.authors.first().map(String::as_str).unwrap_or("")
    }
}

/// Reference records keyed by id. Inserting an existing id replaces the
/// earlier record: two works by the same first author in the same year
/// collapse into one entry.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    records: BTreeMap<String, ReferenceRecord>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ReferenceRecord) -> Option<ReferenceRecord> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn get(&self, id: &str) -> Option<&ReferenceRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceRecord> {
        self.records.values()
    }

    pub fn with_year(&self, year: i32) -> impl Iterator<Item = &ReferenceRecord> {
        self.records.values().filter(move |r| r.year == year)
    }
}

impl FromIterator<ReferenceRecord> for ReferenceIndex {
    fn from_iter<T: IntoIterator<Item = ReferenceRecord>>(iter: T) -> Self {
        let mut index = ReferenceIndex::new();
        for record in iter {
            index.insert(record);
        }
        index
    }
}

/// Walk the tree and parse every entry of the bibliography section(s).
pub fn build_index(root: &DocumentNode, settings: &ReferenceSettings) -> ReferenceIndex {
    let mut index = ReferenceIndex::new();
    let mut entries = 0usize;
    for text in reference_entries(root, settings) {
        entries += 1;
        if let Some(record) = parse_reference(&text) {
            if let Some(previous) = index.insert(record) {
                debug!(id = %previous.id, "reference id collision; keeping the later entry");
            }
        }
    }
    debug!(entries, indexed = index.len(), "built reference index");
    index
}

/// Trimmed text of each bibliography entry long enough to be a reference.
///
/// The bibliography starts at a heading matching one of the configured
/// aliases and ends at the next heading that does not match. A list item
/// wrapping paragraphs yields its paragraphs, not itself.
pub fn reference_entries(root: &DocumentNode, settings: &ReferenceSettings) -> Vec<String> {
    let mut in_references = false;
    let mut entries = Vec::new();
    for event in walk(root) {
        let WalkEvent::Enter { node, .. } = event else {
            continue;
        };
        if node.is_heading() {
            in_references = is_reference_heading(&node.text_content(), &settings.headings);
            continue;
        }
        let entry_block = match node.kind.as_str() {
            "paragraph" => true,
            "listItem" => !node.children().iter().any(|c| c.kind == "paragraph"),
            _ => false,
        };
        if in_references && entry_block {
            let text = node.text_content();
            let text = text.trim();
            if text.chars().count() > settings.min_entry_length {
                entries.push(text.to_string());
            }
        }
    }
    entries
}

static PAREN_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{4})\)").expect("paren year"));
static BARE_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\.").expect("bare year"));
static INITIALS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z]\.?\s*(?:-\s*)?)+$").expect("initials"));

/// Parse one bibliography entry. Returns `None` when no year or no leading
/// author can be found.
pub fn parse_reference(text: &str) -> Option<ReferenceRecord> {
    let caps = PAREN_YEAR_RE
        .captures(text)
        .or_else(|| BARE_YEAR_RE.captures(text))?;
    let whole = caps.get(0)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;

    let before = text[..whole.start()].trim();
    let primary = before
        .split(&[',', '.', '&'][..])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let id = format!(
        "{}{}",
        primary
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>(),
        year
    );

    let mut authors = vec![primary.clone()];
    for segment in before.split(&[',', '&'][..]).skip(1) {
        let segment = segment.trim().trim_end_matches('.').trim();
        if segment.is_empty() || INITIALS_RE.is_match(segment) || segment == "et al" {
            continue;
        }
        if !authors.iter().any(|a| a == segment) {
            authors.push(segment.to_string());
        }
    }

    Some(ReferenceRecord {
        id,
        authors,
        year,
        raw_text: text.to_string(),
        title: extract_title(&text[whole.end()..]),
    })
}

fn extract_title(after_year: &str) -> Option<String> {
    let rest = after_year.trim_start_matches(|c: char| c == '.' || c == ',' || c.is_whitespace());
    let title = match rest.find(". ") {
        Some(idx) => &rest[..idx],
        None => rest.trim_end_matches('.'),
    };
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_apa_entry() {
        let record = parse_reference("Johnson, R., & Lee, T. (2021). Title. Journal.").unwrap();
        assert_eq!(record.id, "johnson2021");
        assert_eq!(record.year, 2021);
        assert_eq!(record.authors, vec!["Johnson".to_string(), "Lee".to_string()]);
        assert_eq!(record.title.as_deref(), Some("Title"));
    }

    #[test]
    fn parses_bare_year_entry() {
        let record = parse_reference("Greenberg, S. A. 2009. How citation distortions create unfounded authority.").unwrap();
        assert_eq!(record.id, "greenberg2009");
        assert_eq!(
            record.title.as_deref(),
            Some("How citation distortions create unfounded authority")
        );
    }

    #[test]
    fn organization_author_keeps_full_name() {
        let record = parse_reference(
            "American Psychological Association. (2020). Publication manual of the APA.",
        )
        .unwrap();
        assert_eq!(record.id, "americanpsychologicalassociation2020");
        assert_eq!(record.primary_author(), "American Psychological Association");
    }

    #[test]
    fn rejects_entries_without_year_or_author() {
        assert!(parse_reference("Some untitled note without any date at all").is_none());
        assert!(parse_reference("(2020). Anonymous pamphlet on things.").is_none());
    }

    #[test]
    fn index_collisions_keep_last_entry() {
        let index: ReferenceIndex = [
            parse_reference("Smith, J. (2020). First work. Press.").unwrap(),
            parse_reference("Smith, K. (2020). Second work. Press.").unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("smith2020").unwrap().title.as_deref(), Some("Second work"));
    }

    #[test]
    fn builds_index_from_reference_section_only() {
        let root = DocumentNode::doc(vec![
            DocumentNode::paragraph(vec![DocumentNode::text(
                "Body cites Miller, A. (2018). Not a reference entry.",
            )]),
            DocumentNode::heading(1, vec![DocumentNode::text(" Bibliography ")]),
            DocumentNode::paragraph(vec![DocumentNode::text(
                "Johnson, R., & Lee, T. (2021). Title. Journal.",
            )]),
            DocumentNode::paragraph(vec![DocumentNode::text("Too short (2020).")]),
            DocumentNode::container(
                "bulletList",
                vec![DocumentNode::container(
                    "listItem",
                    vec![DocumentNode::paragraph(vec![DocumentNode::text(
                        "Adams, B. (2019). Listed entry. Press.",
                    )])],
                )],
            ),
            DocumentNode::heading(1, vec![DocumentNode::text("Appendix")]),
            DocumentNode::paragraph(vec![DocumentNode::text(
                "Zimmer, Q. (2001). After the bibliography.",
            )]),
        ]);
        let index = build_index(&root, &ReferenceSettings::default());
        let ids: Vec<_> = index.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["adams2019", "johnson2021"]);
    }

    #[test]
    fn list_items_are_collected_once() {
        let root = DocumentNode::doc(vec![
            DocumentNode::heading(1, vec![DocumentNode::text("References")]),
            DocumentNode::container(
                "orderedList",
                vec![
                    DocumentNode::container(
                        "listItem",
                        vec![DocumentNode::paragraph(vec![DocumentNode::text(
                            "Adams, B. (2019). Listed entry. Press.",
                        )])],
                    ),
                    DocumentNode::container(
                        "listItem",
                        vec![DocumentNode::text("Baker, C. (2017). Bare list entry. Press.")],
                    ),
                ],
            ),
        ]);
        assert_eq!(
            reference_entries(&root, &ReferenceSettings::default()),
            vec![
                "Adams, B. (2019). Listed entry. Press.".to_string(),
                "Baker, C. (2017). Bare list entry. Press.".to_string(),
            ]
        );
    }
}
