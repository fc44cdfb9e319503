//! Position mapping from a document tree to linear text.
//!
//! The mapper runs two independent folds over the same [`walk`] stream:
//! one accumulates the linear text and the per-character position table,
//! the other tracks heading-delimited sections. Linear text offsets are
//! character indices, never byte offsets; document positions count UTF-16
//! code units.

use serde::{Deserialize, Serialize};

use crate::document::{text_width, walk, DocumentNode, WalkEvent, CITATION_NODE};

/// Kind of a document section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Heading,
    Body,
    Reference,
}

/// A heading-delimited section.
///
/// `start`/`end` are document positions; `text_start`/`text_end` are the
/// matching half-open range in the linear text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub start: usize,
    pub end: usize,
    pub text_start: usize,
    pub text_end: usize,
    pub kind: SectionKind,
}

/// Maximal run of consecutive text leaves with no container boundary or
/// atom in between. Positions inside a run are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRun {
    pub text_start: usize,
    pub text_end: usize,
    pub pos_start: usize,
}

/// Citation that is already structured in the document: a `citation` chip
/// node or a text run carrying a `citation` mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredCitation {
    pub text: String,
    pub position: usize,
    pub end_position: usize,
    pub citation_id: Option<String>,
}

/// Linear view of a document tree.
#[derive(Debug, Clone, Default)]
pub struct MappedDocument {
    pub full_text: String,
    pub text_index_to_pos: Vec<usize>,
    pub sections: Vec<Section>,
    pub runs: Vec<TextRun>,
    pub structured: Vec<StructuredCitation>,
    chars: Vec<char>,
}

impl MappedDocument {
    /// Number of characters in the linear text.
    pub fn char_len(&self) -> usize {
        self.chars.len()
    }

    /// Substring of the linear text by character range.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        if start >= end {
            return String::new();
        }
        self.chars[start..end].iter().collect()
    }

    /// Map a linear half-open range to a document half-open range.
    ///
    /// Returns `None` for empty or out-of-bounds ranges and for ranges that
    /// straddle a container boundary or atom (positions not contiguous).
    pub fn document_range(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end || end > self.text_index_to_pos.len() {
            return None;
        }
        let first = self.text_index_to_pos[start];
        let last = self.text_index_to_pos[end - 1];
        let span: usize = self.chars[start..end - 1].iter().map(|c| c.len_utf16()).sum();
        if last - first != span {
            return None;
        }
        Some((first, last + self.chars[end - 1].len_utf16()))
    }

    /// Section containing linear offset `index`.
    pub fn section_at(&self, index: usize) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| index >= s.text_start && index < s.text_end)
    }

    /// Linear offset where the first bibliography section starts, if any.
    pub fn reference_start(&self) -> Option<usize> {
        self.sections
            .iter()
            .find(|s| s.kind == SectionKind::Reference)
            .map(|s| s.text_start)
    }
}

/// Map a document tree to linear text, offset table, sections and runs.
pub fn map_document(root: &DocumentNode, reference_headings: &[String]) -> MappedDocument {
    let mut offsets = OffsetFold::default();
    let mut sections = SectionFold::new(reference_headings);
    let mut final_pos = 0;

    for event in walk(root) {
        offsets.step(&event);
        sections.step(&event, offsets.chars.len());
        final_pos = match event {
            WalkEvent::Text { text, pos, .. } => pos + text_width(text),
            WalkEvent::Enter { pos, .. } | WalkEvent::Exit { pos, .. } | WalkEvent::Atom { pos, .. } => {
                pos + 1
            }
        };
    }

    let text_len = offsets.chars.len();
    let OffsetFold {
        chars,
        table,
        mut runs,
        open_run,
        structured,
    } = offsets;
    if let Some(run) = open_run {
        runs.push(TextRun {
            text_end: text_len,
            ..run
        });
    }

    MappedDocument {
        full_text: chars.iter().collect(),
        text_index_to_pos: table,
        sections: sections.finish(final_pos, text_len),
        runs,
        structured,
        chars,
    }
}

/// Whether a heading's flattened text names a bibliography section.
pub fn is_reference_heading(text: &str, aliases: &[String]) -> bool {
    let normalized = text.trim().to_lowercase();
    aliases.iter().any(|alias| alias.trim().to_lowercase() == normalized)
}

#[derive(Default)]
struct OffsetFold {
    chars: Vec<char>,
    table: Vec<usize>,
    runs: Vec<TextRun>,
    open_run: Option<TextRun>,
    structured: Vec<StructuredCitation>,
}

impl OffsetFold {
    fn step(&mut self, event: &WalkEvent<'_>) {
        match *event {
            WalkEvent::Text { node, text, pos } => {
                let text_start = self.chars.len();
                let mut unit = pos;
                for ch in text.chars() {
                    self.chars.push(ch);
                    self.table.push(unit);
                    unit += ch.len_utf16();
                }
                if self.open_run.is_none() {
                    self.open_run = Some(TextRun {
                        text_start,
                        text_end: text_start,
                        pos_start: pos,
                    });
                }
                if node.has_mark(CITATION_NODE) && !text.is_empty() {
                    let citation_id = node
                        .marks
                        .iter()
                        .find(|m| m.kind == CITATION_NODE)
                        .and_then(|m| m.attrs.as_ref())
                        .and_then(|a| a.get("citationId"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    self.structured.push(StructuredCitation {
                        text: text.to_string(),
                        position: pos,
                        end_position: pos + text_width(text),
                        citation_id,
                    });
                }
            }
            WalkEvent::Atom { node, pos } => {
                self.close_run();
                if node.kind == CITATION_NODE {
                    self.structured.push(StructuredCitation {
                        text: node.attr_str("fallback").unwrap_or("Citation").to_string(),
                        position: pos,
                        end_position: pos + 1,
                        citation_id: node.attr_str("citationId").map(str::to_string),
                    });
                }
            }
            WalkEvent::Enter { .. } | WalkEvent::Exit { .. } => self.close_run(),
        }
    }

    fn close_run(&mut self) {
        if let Some(run) = self.open_run.take() {
            let text_end = self.chars.len();
            if text_end > run.text_start {
                self.runs.push(TextRun { text_end, ..run });
            }
        }
    }
}

struct SectionFold<'a> {
    aliases: &'a [String],
    current: Section,
    done: Vec<Section>,
}

impl<'a> SectionFold<'a> {
    fn new(aliases: &'a [String]) -> Self {
        Self {
            aliases,
            current: Section {
                title: "Introduction".into(),
                start: 0,
                end: 0,
                text_start: 0,
                text_end: 0,
                kind: SectionKind::Body,
            },
            done: Vec::new(),
        }
    }

    fn step(&mut self, event: &WalkEvent<'_>, text_len: usize) {
        let WalkEvent::Enter { node, pos, .. } = *event else {
            return;
        };
        if !node.is_heading() {
            return;
        }
        let title = node.text_content();
        let kind = if is_reference_heading(&title, self.aliases) {
            SectionKind::Reference
        } else {
            SectionKind::Heading
        };
        let next = Section {
            title,
            start: pos,
            end: 0,
            text_start: text_len,
            text_end: 0,
            kind,
        };
        let previous = std::mem::replace(&mut self.current, next);
        self.close(previous, pos, text_len);
    }

    fn close(&mut self, mut section: Section, end: usize, text_end: usize) {
        section.end = end;
        section.text_end = text_end;
        // the implicit leading body section is only kept when it holds text
        if section.kind == SectionKind::Body && section.text_end == section.text_start {
            return;
        }
        self.done.push(section);
    }

    fn finish(mut self, end: usize, text_end: usize) -> Vec<Section> {
        let last = std::mem::replace(
            &mut self.current,
            Section {
                title: String::new(),
                start: 0,
                end: 0,
                text_start: 0,
                text_end: 0,
                kind: SectionKind::Body,
            },
        );
        self.close(last, end, text_end);
        self.done
    }
}
