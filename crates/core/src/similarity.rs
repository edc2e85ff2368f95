use crate::classifier::{name_tokens, QUESTION_KEYWORDS, SOLUTION_KEYWORDS};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^20\d\d$").expect("year regex is valid"));

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(chapter|chp|ch|topic|section|sec|part|tutorial|tut)(\d*)$")
        .expect("section marker regex is valid")
});

fn is_role_keyword(token: &str) -> bool {
    SOLUTION_KEYWORDS
        .iter()
        .chain(QUESTION_KEYWORDS)
        .any(|keyword| !keyword.contains(' ') && *keyword == token)
}

/// Word tokens left after removing the extension, role keywords, `20xx` years
/// and chapter/topic/section numbering from a file name.
pub fn base_tokens(filename: &str) -> BTreeSet<String> {
    let tokens = name_tokens(filename);
    let mut kept = BTreeSet::new();
    let mut skip_number = false;

    for token in tokens {
        if skip_number {
            skip_number = false;
            if token.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
        }

        if let Some(marker) = SECTION_MARKER.captures(&token) {
            // "chapter 3" spans two tokens, "ch3" only one.
            skip_number = marker.get(2).is_some_and(|digits| digits.as_str().is_empty());
            continue;
        }

        if is_role_keyword(&token) || YEAR.is_match(&token) {
            continue;
        }

        kept.insert(token);
    }

    kept
}

/// Overlap of two token sets relative to the larger one. Zero when either side
/// is empty.
pub fn token_similarity(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f64 {
    let larger = left.len().max(right.len());
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(right).count();
    shared as f64 / larger as f64
}

/// Symmetric similarity of two file names in `[0, 1]`.
pub fn similarity(name_a: &str, name_b: &str) -> f64 {
    token_similarity(&base_tokens(name_a), &base_tokens(name_b))
}
