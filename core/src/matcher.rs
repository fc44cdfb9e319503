//! Candidate-to-reference matching.

use serde::Serialize;

use crate::patterns::CitationCandidate;
use crate::references::{ReferenceIndex, ReferenceRecord};

/// Minimum score for a candidate to be accepted as a match.
pub const MATCH_THRESHOLD: f64 = 0.8;

/// Accepted match between a candidate and a reference record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult<'a> {
    pub id: String,
    pub score: f64,
    pub record: &'a ReferenceRecord,
}

/// Similarity between a cited author string and a reference author string.
///
/// `1.0` for case-insensitive equality, `0.9` when one contains the other,
/// `0.8` for the single hard-coded organisation acronym ("apa" for the
/// American Psychological Association), `0.0` otherwise.
pub fn score_authors(cited: &str, reference: &str) -> f64 {
    let cited = cited.trim().to_lowercase();
    let reference = reference.trim().to_lowercase();
    if cited.is_empty() || reference.is_empty() {
        return 0.0;
    }
    if cited == reference {
        1.0
    } else if reference.contains(&cited) || cited.contains(&reference) {
        0.9
    } else if cited == "apa" && reference.contains("american psychological") {
        // TODO: replace with an acronym expansion table once one exists.
        0.8
    } else {
        0.0
    }
}

/// Highest-scoring reference from the candidate's year, regardless of
/// threshold. The first record in index order wins a tie.
pub fn best_candidate<'a>(
    candidate: &CitationCandidate,
    index: &'a ReferenceIndex,
) -> Option<(f64, &'a ReferenceRecord)> {
    let author = candidate.authors.first()?;
    let year = candidate.year?;

    let mut best: Option<(f64, &ReferenceRecord)> = None;
    for record in index.with_year(year) {
        let score = score_authors(author, record.primary_author());
        if score > best.map(|(s, _)| s).unwrap_or(0.0) {
            best = Some((score, record));
        }
    }
    best
}

/// Match a candidate against the index, accepting only scores at or above
/// `threshold`.
pub fn match_candidate<'a>(
    candidate: &CitationCandidate,
    index: &'a ReferenceIndex,
    threshold: f64,
) -> Option<MatchResult<'a>> {
    let (score, record) = best_candidate(candidate, index)?;
    if score < threshold {
        return None;
    }
    Some(MatchResult {
        id: record.id.clone(),
        score,
        record,
    })
}
