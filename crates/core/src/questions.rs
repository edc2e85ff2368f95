//! Pattern-based question/solution matching used when the model cannot pair a
//! question paper with its solutions.

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::LazyLock;

const STOP_WORDS: &[&str] = &["what", "when", "where", "which", "find", "calculate", "determine"];

const ADVANCED_TERMS: &[&str] = &[
    "prove",
    "derive",
    "show that",
    "hence",
    "therefore",
    "deduce",
    "complex",
    "advanced",
];

const MIN_FALLBACK_QUESTION_CHARS: usize = 20;
const MISSING_SOLUTION: &str = "Solution not found";

static QUESTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\d+\.|\(\d+\)|\[\d+\]|question\s*\d+\s*[:.)])\s*")
        .expect("question marker regex is valid")
});

static SOLUTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+\.|\(\d+\)|\[\d+\]|Solution)").expect("solution start regex is valid")
});

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank line regex is valid"));

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("non-word regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

/// Splits a question paper into questions. A numbered line (`1.`, `(1)`,
/// `[1]`, `Question 1:`) opens a question; following non-blank lines belong to
/// it. Unnumbered text falls back to its longer paragraphs.
pub fn extract_questions(text: &str) -> Vec<String> {
    let mut questions = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if let Some(marker) = QUESTION_MARKER.find(line) {
            if let Some(done) = current.take() {
                questions.push(done);
            }
            current = Some(line[marker.end()..].trim_end().to_string());
        } else if line.trim().is_empty() {
            if let Some(done) = current.take() {
                questions.push(done);
            }
        } else if let Some(open) = current.as_mut() {
            open.push('\n');
            open.push_str(line.trim_end());
        }
    }
    if let Some(done) = current {
        questions.push(done);
    }

    questions.retain(|question| !question.trim().is_empty());
    if !questions.is_empty() {
        return questions;
    }

    BLANK_LINES
        .split(text)
        .map(str::trim)
        .filter(|paragraph| paragraph.chars().count() > MIN_FALLBACK_QUESTION_CHARS)
        .map(str::to_string)
        .collect()
}

fn significant_words(question: &str) -> Vec<String> {
    NON_WORD
        .replace_all(&question.to_lowercase(), " ")
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Blocks of a solution document, each starting at a numbered line or a
/// `Solution` heading.
fn solution_blocks(solution_text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    for paragraph in BLANK_LINES.split(solution_text) {
        match blocks.last_mut() {
            Some(block) if !SOLUTION_START.is_match(paragraph) => {
                block.push_str("\n\n");
                block.push_str(paragraph);
            }
            _ => blocks.push(paragraph.to_string()),
        }
    }
    blocks
}

/// The solution block sharing the most significant words with `question`,
/// provided it shares more than `min(3, words / 2)` of them.
pub fn find_matching_solution(question: &str, solution_text: &str) -> Option<String> {
    let words = significant_words(question);
    let mut best: Option<(usize, String)> = None;

    for block in solution_blocks(solution_text) {
        let lowered = block.to_lowercase();
        let score = words.iter().filter(|word| lowered.contains(word.as_str())).count();
        if score > best.as_ref().map_or(0, |(top, _)| *top) {
            best = Some((score, block));
        }
    }

    let required = f64::min(3.0, words.len() as f64 / 2.0);
    best.filter(|(score, _)| *score as f64 > required)
        .map(|(_, block)| block.trim().to_string())
}

/// Keyword and length heuristic: each advanced term scores one, every 200
/// characters score one more.
pub fn estimate_difficulty(question: &str) -> Difficulty {
    let lowered = question.to_lowercase();
    let advanced = ADVANCED_TERMS
        .iter()
        .filter(|term| lowered.contains(*term))
        .count();
    let score = advanced as f64 + question.chars().count() as f64 / 200.0;

    if score > 3.0 {
        Difficulty::Hard
    } else if score > 1.5 {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}

/// Practice-question entries for a pair the model could not structure.
pub fn match_questions_to_solutions(question_text: &str, solution_text: &str) -> Vec<Value> {
    extract_questions(question_text)
        .into_iter()
        .enumerate()
        .map(|(index, question)| {
            let solution = find_matching_solution(&question, solution_text)
                .unwrap_or_else(|| MISSING_SOLUTION.to_string());
            json!({
                "question_number": index + 1,
                "difficulty_level": estimate_difficulty(&question).as_str(),
                "question_text": question,
                "solution": solution,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_questions_keep_continuation_lines() {
        let text = "1. Find x if 2x = 4.\n2. Differentiate sin x\nwith respect to x.\n\nEnd of paper";
        assert_eq!(
            extract_questions(text),
            vec![
                "Find x if 2x = 4.".to_string(),
                "Differentiate sin x\nwith respect to x.".to_string(),
            ]
        );
    }

    #[test]
    fn question_headings_and_bracketed_numbers() {
        let text = "Question 1: Solve the quadratic.\n(2) Sketch the curve.\n[3] State the range.";
        assert_eq!(
            extract_questions(text),
            vec![
                "Solve the quadratic.".to_string(),
                "Sketch the curve.".to_string(),
                "State the range.".to_string(),
            ]
        );
    }

    #[test]
    fn unnumbered_text_falls_back_to_long_paragraphs() {
        let text = "Explain why the derivative of a constant is zero\n\nshort bit";
        assert_eq!(
            extract_questions(text),
            vec!["Explain why the derivative of a constant is zero".to_string()]
        );
    }

    #[test]
    fn solution_with_most_shared_words_wins() {
        let question = "Differentiate the sine function with respect to the variable";
        let solutions = "1. The derivative of the sine function with respect to the variable is cosine.\n\n\
                         2. Integrate polynomial terms one at a time.";

        let matched = find_matching_solution(question, solutions);
        assert_eq!(
            matched.as_deref(),
            Some("1. The derivative of the sine function with respect to the variable is cosine.")
        );
        assert_eq!(find_matching_solution(question, "2. Integrate polynomial terms."), None);
    }

    #[test]
    fn unnumbered_paragraphs_join_the_previous_solution_block() {
        let blocks = solution_blocks("Solution 1\nx = 2\n\nworking continued\n\nSolution 2\ny = 3");
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].ends_with("working continued"));
    }

    #[test]
    fn difficulty_from_terms_and_length() {
        assert_eq!(estimate_difficulty("Find x."), Difficulty::Easy);
        assert_eq!(estimate_difficulty("Prove the result and hence state it."), Difficulty::Medium);
        assert_eq!(
            estimate_difficulty(
                "Prove the identity, hence deduce the limit and show that it converges."
            ),
            Difficulty::Hard
        );
    }

    #[test]
    fn unmatched_questions_are_marked() {
        let entries =
            match_questions_to_solutions("1. Find the area of the triangle.", "unrelated");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["question_number"], 1);
        assert_eq!(entries[0]["solution"], MISSING_SOLUTION);
        assert_eq!(entries[0]["difficulty_level"], "Easy");
    }
}
