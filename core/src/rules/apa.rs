use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{contains_year, numeric_rule, PatternRule, Suggestion};
use crate::report::Severity;

static ET_AL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+)\s+et\s+al\b(\.)?").expect("apa et al regex"));

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]+)\)").expect("apa parenthetical regex"));

static NAMES_JOINED_BY_AND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+and\s+[A-Z][a-z]+").expect("apa and regex"));

pub(super) fn rules() -> Vec<PatternRule> {
    vec![
        numeric_rule(
            "apa-numeric-citations",
            "APA_INVALID_NUMERIC",
            "APA uses parenthetical citations (Author, Year), not numeric brackets like [1].",
            "Convert to (Author, Year) format.",
            "(Author, Year)",
        ),
        PatternRule::new("apa-et-al-format", "APA_ET_AL_PERIOD", (*ET_AL).clone())
            .describe("'et al' missing its period")
            .message("'et al' should be followed by a period: 'et al.'")
            .severity(Severity::Warning)
            .expect("et al.")
            .guard(|caps| caps.get(2).is_none())
            .suggest(Suggestion::Rewrite(|caps| format!("{} et al.", &caps[1]))),
        PatternRule::new(
            "apa-ampersand-parenthetical",
            "APA_AMPERSAND",
            (*PARENTHETICAL).clone(),
        )
        .describe("'and' instead of '&' inside parenthetical citations")
        .message("Use '&' instead of 'and' inside parenthetical citations.")
        .severity(Severity::Warning)
        .expect("(Author & Author, Year)")
        .guard(joins_authors_with_and)
        .suggest(Suggestion::Rewrite(|caps| caps[0].replacen(" and ", " & ", 1))),
    ]
}

fn joins_authors_with_and(caps: &Captures<'_>) -> bool {
    let inside = &caps[1];
    contains_year(inside) && NAMES_JOINED_BY_AND.is_match(inside)
}
