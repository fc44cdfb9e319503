//! Rewriting matched plain-text citations into structured citation nodes.
//!
//! [`Normalizer::normalize`] only reads the tree and returns the accepted
//! [`Replacement`]s plus the candidates that need a human. The caller then
//! applies the batch with [`apply_replacements`], which works back to front
//! so earlier offsets stay valid.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{node_size, DocumentNode};
use crate::error::NormalizeError;
use crate::matcher::best_candidate;
use crate::patterns::{extract_patterns, longest_span_wins, CitationCandidate, OverlapPolicy};
use crate::position::{map_document, MappedDocument};
use crate::references::{build_index, ReferenceIndex};
use crate::{Config, ReferenceSettings};

/// Accepted replacement of a document range by a citation node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub citation_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    NeedsReview,
}

/// A candidate that could not be matched with enough confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationIssue {
    pub text: String,
    pub reason: String,
    /// Raw text of the closest reference entries, if any.
    pub candidates: Vec<String>,
    pub status: IssueStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResult {
    pub replacements: Vec<Replacement>,
    pub issues: Vec<NormalizationIssue>,
}

impl NormalizationResult {
    pub fn normalized_count(&self) -> usize {
        self.replacements.len()
    }
}

pub struct Normalizer {
    references: ReferenceSettings,
    threshold: f64,
    policy: OverlapPolicy,
}

impl Normalizer {
    pub fn new(config: &Config) -> Self {
        Self {
            references: config.references.clone(),
            threshold: config.matching.threshold,
            policy: longest_span_wins,
        }
    }

    /// Swap the overlap resolution strategy.
    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Detect and match candidates in the body text. The scan stops at the
    /// first bibliography section.
    pub fn normalize(&self, root: &DocumentNode) -> NormalizationResult {
        let index = build_index(root, &self.references);
        let mapped = map_document(root, &self.references.headings);
        let limit = mapped.reference_start().unwrap_or_else(|| mapped.char_len());

        let mut result = NormalizationResult::default();
        for run in &mapped.runs {
            if run.text_start >= limit {
                break;
            }
            let text = mapped.slice(run.text_start, run.text_end.min(limit));
            let candidates = (self.policy)(extract_patterns(&text, run.text_start));
            for candidate in candidates.into_iter().filter(|c| c.year.is_some()) {
                let Some((start, end)) = mapped.document_range(candidate.start(), candidate.end())
                else {
                    continue;
                };
                if already_structured(&mapped, start, end) {
                    continue;
                }
                self.resolve(candidate, start, end, &index, &mut result);
            }
        }

        info!(
            normalized = result.replacements.len(),
            issues = result.issues.len(),
            references = index.len(),
            "normalization scan finished"
        );
        result
    }

    fn resolve(
        &self,
        candidate: CitationCandidate,
        start: usize,
        end: usize,
        index: &ReferenceIndex,
        result: &mut NormalizationResult,
    ) {
        match best_candidate(&candidate, index) {
            Some((score, record)) if score >= self.threshold => {
                debug!(text = %candidate.text, id = %record.id, score, "matched candidate");
                result.replacements.push(Replacement {
                    start,
                    end,
                    citation_id: record.id.clone(),
                    text: candidate.text,
                });
            }
            Some((score, record)) => result.issues.push(NormalizationIssue {
                text: candidate.text,
                reason: format!("Low confidence ({score})"),
                candidates: vec![record.raw_text.clone()],
                status: IssueStatus::NeedsReview,
            }),
            None => result.issues.push(NormalizationIssue {
                text: candidate.text,
                reason: "No matching reference found".into(),
                candidates: Vec::new(),
                status: IssueStatus::NeedsReview,
            }),
        }
    }
}

fn already_structured(mapped: &MappedDocument, start: usize, end: usize) -> bool {
    mapped
        .structured
        .iter()
        .any(|s| start < s.end_position && s.position < end)
}

/// Replace each range with a `citation` atom node. The batch is applied to a
/// copy and only committed when every replacement lands inside a single
/// text node; otherwise `root` is left untouched.
pub fn apply_replacements(
    root: &mut DocumentNode,
    mut replacements: Vec<Replacement>,
) -> Result<usize, NormalizeError> {
    replacements.sort_by(|a, b| b.start.cmp(&a.start));
    for pair in replacements.windows(2) {
        if pair[1].end > pair[0].start {
            return Err(NormalizeError::Overlap {
                first: pair[1].start,
                second: pair[0].start,
            });
        }
    }

    let mut working = root.clone();
    for replacement in &replacements {
        let applied = match working.content.as_mut() {
            Some(children) => replace_in(children, 0, replacement),
            None => false,
        };
        if !applied {
            return Err(NormalizeError::InvalidRange {
                start: replacement.start,
                end: replacement.end,
            });
        }
    }
    *root = working;
    Ok(replacements.len())
}

fn replace_in(children: &mut Vec<DocumentNode>, mut pos: usize, rep: &Replacement) -> bool {
    if rep.start >= rep.end {
        return false;
    }
    for idx in 0..children.len() {
        let node_start = pos;
        pos += node_size(&children[idx]);
        if rep.start < node_start || rep.start >= pos {
            continue;
        }

        let child = &mut children[idx];
        if let Some(text) = child.text.as_deref() {
            if rep.end > pos {
                return false;
            }
            let chars: Vec<char> = text.chars().collect();
            let (Some(cut_start), Some(cut_end)) = (
                char_index(&chars, rep.start - node_start),
                char_index(&chars, rep.end - node_start),
            ) else {
                return false;
            };
            let before: String = chars[..cut_start].iter().collect();
            let after: String = chars[cut_end..].iter().collect();

            let mut pieces = Vec::with_capacity(3);
            if !before.is_empty() {
                pieces.push(DocumentNode {
                    text: Some(before),
                    ..child.clone()
                });
            }
            pieces.push(DocumentNode::citation(rep.citation_id.as_str(), rep.text.as_str()));
            if !after.is_empty() {
                pieces.push(DocumentNode {
                    text: Some(after),
                    ..child.clone()
                });
            }
            children.splice(idx..=idx, pieces);
            return true;
        }
        return match child.content.as_mut() {
            Some(grandchildren) => replace_in(grandchildren, node_start + 1, rep),
            None => false,
        };
    }
    false
}

/// Index of the char starting `units` UTF-16 units into `chars`; `None`
/// inside a surrogate pair.
fn char_index(chars: &[char], units: usize) -> Option<usize> {
    let mut seen = 0;
    for (i, ch) in chars.iter().enumerate() {
        if seen == units {
            return Some(i);
        }
        seen += ch.len_utf16();
    }
    (seen == units).then_some(chars.len())
}
