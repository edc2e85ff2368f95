//! Role classification for course documents.
//!
//! A file name is split into lowercase alphanumeric tokens and checked against
//! three keyword taxonomies. Keywords match whole tokens (or runs of tokens for
//! multi-word keywords), so `examine` never counts as `exam`.

use crate::llm::LanguageModel;
use crate::models::Role;
use crate::prompts::classification_prompt;
use crate::recovery::parse_lenient;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const SOLUTION_KEYWORDS: &[&str] = &[
    "solution",
    "solutions",
    "soln",
    "solns",
    "sol",
    "sols",
    "answer",
    "answers",
    "ans",
    "anss",
    "worked",
    "worked example",
    "worked examples",
    "key",
    "keys",
    "answer key",
    "answer keys",
    "suggested solution",
    "suggested solutions",
    "tutor",
    "tutors",
    "teacher",
    "teachers",
];

pub const QUESTION_KEYWORDS: &[&str] = &[
    "question",
    "questions",
    "qn",
    "qns",
    "problem",
    "problems",
    "exercise",
    "exercises",
    "worksheet",
    "worksheets",
    "assignment",
    "assignments",
    "practice",
    "test",
    "exam",
    "quiz",
    "tutorial",
    "student",
    "package",
    "revision",
];

pub const NOTE_KEYWORDS: &[&str] = &[
    "note",
    "notes",
    "lecture",
    "lectures",
    "summary",
    "summaries",
    "chapter",
    "chapters",
    "topic",
    "topics",
    "theory",
    "concept",
    "learning package",
    "guide",
    "handbook",
    "manual",
    "reference",
    "cheat sheet",
    "formula",
    "definition",
    "explanation",
];

const CONTENT_SOLUTION_INDICATORS: &[&str] = &[
    "solution",
    "solutions",
    "answer",
    "answers",
    "solved",
    "worked example",
    "ans:",
    "sol:",
    "soln:",
    "answer:",
    "solution:",
];

const CONTENT_QUESTION_INDICATORS: &[&str] = &[
    "question",
    "questions",
    "problem",
    "problems",
    "exercise",
    "exercises",
    "q1.",
    "q2.",
    "q1)",
    "q2)",
    "question 1",
    "question 2",
];

static PAPER_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bmq|apq").expect("paper code regex is valid"));

static NUMBERED_CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(ch|chapter|topic).*\d").expect("numbered chapter regex is valid")
});

static STAFF_COPY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tutor|teacher|lecturer").expect("staff copy regex is valid"));

/// Which keyword taxonomies a file name hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordHits {
    pub solution: bool,
    pub question: bool,
    pub note: bool,
}

impl KeywordHits {
    pub fn of(filename: &str) -> Self {
        let tokens = name_tokens(filename);
        Self {
            solution: matches_any(&tokens, SOLUTION_KEYWORDS),
            question: matches_any(&tokens, QUESTION_KEYWORDS),
            note: matches_any(&tokens, NOTE_KEYWORDS),
        }
    }
}

/// Assigns a role from the file name alone. Keyword combinations are checked
/// in a fixed priority order; names with no keyword fall through to paper-code
/// heuristics and finally [`Role::Unknown`].
pub fn classify(filename: &str) -> Role {
    let hits = KeywordHits::of(filename);

    match (hits.solution, hits.question, hits.note) {
        (true, true, _) => Role::Combined,
        (true, false, true) => Role::NoteWithSolutions,
        (false, true, true) => Role::NoteWithQuestions,
        (true, false, false) => Role::Solution,
        (false, true, false) => Role::Question,
        (false, false, true) => Role::Note,
        (false, false, false) => classify_by_pattern(filename),
    }
}

fn classify_by_pattern(filename: &str) -> Role {
    let lowered = base_name(filename).to_lowercase();
    if lowered.is_empty() {
        return Role::Unknown;
    }

    if let Some(code) = PAPER_CODE.find(&lowered) {
        return if lowered[code.end()..].contains("sol") {
            Role::Solution
        } else {
            Role::Question
        };
    }

    if NUMBERED_CHAPTER.is_match(&lowered) {
        Role::Note
    } else if STAFF_COPY.is_match(&lowered) {
        Role::NoteWithSolutions
    } else {
        Role::Unknown
    }
}

/// Classifies extracted text by counting solution and question cues. Used for
/// files whose name gave no signal.
pub fn classify_content(text: &str) -> Role {
    if text.trim().is_empty() {
        return Role::Unknown;
    }

    let lowered = text.to_lowercase();
    let count = |indicators: &[&str]| -> usize {
        indicators
            .iter()
            .map(|indicator| lowered.matches(indicator).count())
            .sum()
    };

    let solution_count = count(CONTENT_SOLUTION_INDICATORS) as f64;
    let question_count = count(CONTENT_QUESTION_INDICATORS) as f64;

    if solution_count > question_count * 1.5 {
        Role::Solution
    } else if question_count > solution_count {
        Role::Question
    } else {
        Role::Note
    }
}

/// Confidence given to a label read from free text instead of JSON.
const KEYWORD_CONFIDENCE: f64 = 0.5;

/// A role decided by the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentClassification {
    pub role: Role,
    /// Between 0 and 1. Zero when the model was not consulted or failed.
    pub confidence: f64,
    pub reasoning: Option<String>,
}

impl ContentClassification {
    fn heuristic(text: &str) -> Self {
        Self {
            role: classify_content(text),
            confidence: 0.0,
            reasoning: None,
        }
    }
}

/// Asks `model` what kind of document `text` comes from. A failed call falls
/// back to [`classify_content`] with zero confidence.
pub async fn classify_with_model(model: &dyn LanguageModel, text: &str) -> ContentClassification {
    if text.trim().is_empty() {
        return ContentClassification::heuristic(text);
    }

    match model.complete(&classification_prompt(text)).await {
        Ok(raw) => {
            let classification = interpret_classification(&raw);
            debug!(
                role = %classification.role,
                confidence = classification.confidence,
                "model classification"
            );
            classification
        }
        Err(error) => {
            warn!(reason = %error, "model classification failed, using content cues");
            ContentClassification::heuristic(text)
        }
    }
}

/// Reads a classification reply. Without a usable JSON label the reply text
/// itself is scanned for `solution` and then `question`.
pub fn interpret_classification(raw: &str) -> ContentClassification {
    let parsed = parse_lenient(raw);
    let labelled = parsed.as_ref().and_then(|value| {
        let role = value
            .get("classification")
            .and_then(Value::as_str)
            .map(role_for_label)
            .filter(|role| *role != Role::Unknown)?;
        Some((role, value))
    });

    if let Some((role, value)) = labelled {
        return ContentClassification {
            role,
            confidence: value
                .get("confidence")
                .and_then(Value::as_f64)
                .map_or(KEYWORD_CONFIDENCE, |confidence| confidence.clamp(0.0, 1.0)),
            reasoning: value
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_string),
        };
    }

    let lowered = raw.to_lowercase();
    let role = if lowered.contains("solution") {
        Role::Solution
    } else if lowered.contains("question") {
        Role::Question
    } else {
        Role::Note
    };
    ContentClassification {
        role,
        confidence: KEYWORD_CONFIDENCE,
        reasoning: None,
    }
}

/// Maps a model label onto a role. Serialized role names and their short
/// forms are both accepted.
pub fn role_for_label(label: &str) -> Role {
    let normalized = label.trim().to_lowercase().replace([' ', '-', '/'], "_");
    match normalized.as_str() {
        "question_paper" | "question" | "questions" | "worksheet" => Role::Question,
        "solution" | "solutions" | "answers" => Role::Solution,
        "standalone_note" | "note" | "notes" => Role::Note,
        "combined_question_solution" | "combined" => Role::Combined,
        "notes_with_solutions" => Role::NoteWithSolutions,
        "notes_with_questions" => Role::NoteWithQuestions,
        _ => Role::Unknown,
    }
}

/// Final path component of `filename`, or the input itself when it has none.
pub(crate) fn base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
}

/// File name without its extension.
pub(crate) fn stem(filename: &str) -> &str {
    Path::new(base_name(filename))
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
}

/// Lowercase alphanumeric runs of the file stem. Underscores, dashes, dots and
/// whitespace all act as delimiters.
pub(crate) fn name_tokens(filename: &str) -> Vec<String> {
    stem(filename)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn matches_any(tokens: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| contains_phrase(tokens, keyword))
}

fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() || words.len() > tokens.len() {
        return false;
    }

    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(token, word)| token == word))
}
