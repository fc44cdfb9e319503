use once_cell::sync::Lazy;
use regex::Regex;

use super::{numeric_rule, PatternRule, Suggestion};
use crate::report::Severity;
use crate::ChicagoVariant;

static AUTHOR_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([\p{L}\s&.'\-]+,?\s*(?:19|20)\d{2}[a-z]?\)").expect("chicago author-year regex")
});

pub(super) fn rules(variant: ChicagoVariant) -> Vec<PatternRule> {
    let mut rules = vec![numeric_rule(
        "chicago-numeric-citations",
        "CHICAGO_INVALID_NUMERIC",
        "Chicago uses footnotes or (Author Year), not numeric brackets like [1].",
        "Convert to a footnote.",
        "footnote",
    )];
    if variant == ChicagoVariant::NotesBibliography {
        rules.push(
            PatternRule::new(
                "chicago-parenthetical-check",
                "CHICAGO_PARENTHETICAL_WARN",
                (*AUTHOR_YEAR).clone(),
            )
            .describe("Parenthetical citations under notes-bibliography")
            .message(
                "Chicago notes-bibliography style cites with footnotes, not parenthetical (Author, Year).",
            )
            .severity(Severity::Warning)
            .expect("footnote")
            .suggest(Suggestion::Fixed("Convert to a footnote.".into())),
        );
    }
    rules
}
