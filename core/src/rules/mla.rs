use once_cell::sync::Lazy;
use regex::Regex;

use super::{contains_year, numeric_rule, PatternRule, Suggestion};
use crate::report::Severity;

static YEAR_IN_PAREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([A-Z][^()]*?\b(?:19|20)\d{2}[a-z]?\b[^()]*\)").expect("mla year regex")
});

static COMMA_BEFORE_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([A-Z][\p{L}'\-]+,\s+\d+(?:-\d+)?\)").expect("mla comma regex"));

pub(super) fn rules() -> Vec<PatternRule> {
    vec![
        numeric_rule(
            "mla-numeric-citations",
            "MLA_INVALID_NUMERIC",
            "MLA uses parenthetical citations (Author Page), not numeric brackets like [1].",
            "Convert to (Author Page) format.",
            "(Author Page)",
        ),
        PatternRule::new("mla-year-in-parenthesis", "MLA_YEAR_IN_CITATION", (*YEAR_IN_PAREN).clone())
            .describe("Year inside a parenthetical citation")
            .message("MLA internal citations include Author and Page Number, but not the Year.")
            .severity(Severity::Warning)
            .expect("(Author Page)")
            .suggest(Suggestion::Fixed("Remove the year.".into())),
        PatternRule::new("mla-comma-separator", "MLA_COMMA_SEPARATOR", (*COMMA_BEFORE_PAGE).clone())
            .describe("Comma between author and page number")
            .message("MLA citations do not use a comma between Author and Page Number.")
            .severity(Severity::Warning)
            .expect("(Author Page)")
            .guard(|caps| !contains_year(&caps[0]))
            .suggest(Suggestion::Rewrite(|caps| caps[0].replacen(',', "", 1))),
    ]
}
