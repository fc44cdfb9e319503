use once_cell::sync::Lazy;
use regex::Regex;

use super::{contains_year, PatternRule, Suggestion};

static AUTHOR_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([\p{L}\s&.'\-]+,?\s*(?:19|20)\d{2}[a-z]?\)").expect("ieee author-year regex")
});

static AUTHOR_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([A-Z][\p{L}'\-]+,?\s+(\d+)(?:-\d+)?\)").expect("ieee author-page regex")
});

pub(super) fn rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            "ieee-authoryear-citations",
            "IEEE_INVALID_PARENTHETICAL",
            (*AUTHOR_YEAR).clone(),
        )
        .describe("Parenthetical author-year citations")
        .message("IEEE uses numeric citations [1], not parenthetical (Author, Year).")
        .expect("[n]")
        .suggest(Suggestion::Fixed("Convert to [Number] format.".into())),
        PatternRule::new("ieee-mla-style", "IEEE_INVALID_MLA", (*AUTHOR_PAGE).clone())
            .describe("Parenthetical author-page citations")
            .message("IEEE uses numeric citations [1], not parenthetical (Author Page).")
            .expect("[n]")
            .guard(|caps| !contains_year(&caps[1]))
            .suggest(Suggestion::Fixed("Convert to [Number] format.".into())),
    ]
}
