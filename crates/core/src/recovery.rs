//! Salvaging JSON objects from free-form language model output.
//!
//! Candidate spans are tried in order: ```` ```json ```` fences, other fences,
//! the text outside fences, then the whole text with fence markers stripped.
//! Each span goes through a strict parse of its outermost braces, a parse
//! after textual repairs and a parse of the `content` sub-object alone. A span
//! yielding `metadata` or `content` wins outright; otherwise the richest object
//! found is kept. When no span parses, a regex scrape of the prose takes over.
//! That last stage cannot fail, so recovery always produces an object with
//! `metadata` and `content` keys.

use crate::models::ExtractionMethod;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

const MAX_FALLBACK_CONCEPTS: usize = 5;
const MAX_FALLBACK_QUESTIONS: usize = 3;
const FALLBACK_SUMMARY_CHARS: usize = 200;

static REASONING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("reasoning regex is valid"));

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z]*)[ \t]*\r?\n?(.*?)```").expect("fence regex is valid")
});

static FENCE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").expect("fence marker regex is valid"));

static QUOTE_NEWLINE_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\s*\n\s*)""#).expect("quote repair regex is valid"));

static SCALAR_NEWLINE_QUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d|true|false|null)(\s*\n\s*)""#).expect("scalar repair regex is valid")
});

static CLOSER_NEWLINE_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([}\]])(\s*\n\s*)([{"])"#).expect("closer repair regex is valid")
});

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex is valid"));

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").expect("bare key regex is valid")
});

static STRAY_BACKSLASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\\])\\([^"\\/bfnrtu])"#).expect("backslash regex is valid")
});

static CONTENT_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""content"\s*:\s*\{"#).expect("content key regex is valid"));

static DEFINITION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"([A-Z][a-zA-Z\s]+):\s*([^\.]+\.)",
        r"([A-Z][a-zA-Z\s]+)\s+is\s+([^\.]+\.)",
        r"Definition[:\s]+([^\.]+\.)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("definition regex is valid"))
    .collect()
});

static FORMULA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z][^=\n]+)=([^\n]+)").expect("formula regex is valid"));

static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(\d+\.\s*[^\?]+\?)", r"(Question\s*\d+[^\.]+\.)"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("question regex is valid"))
        .collect()
});

/// A recovered JSON object and the stage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub method: ExtractionMethod,
}

impl Recovered {
    pub fn is_fallback(&self) -> bool {
        self.method == ExtractionMethod::Fallback
    }
}

/// Recovers a JSON object from raw model output, scraping the output itself
/// when nothing parses.
pub fn extract_and_repair(raw: &str) -> Recovered {
    recover(raw, None)
}

/// Like [`extract_and_repair`], but a failed parse scrapes `source_text` (the
/// document the model was asked about) instead of the model's prose.
pub fn recover_with_source(raw: &str, source_text: &str) -> Recovered {
    recover(raw, Some(source_text))
}

/// The parsing stages alone. `None` when no stage yields an object.
pub fn parse_lenient(raw: &str) -> Option<Value> {
    parse_stages(&strip_reasoning(raw)).map(|(value, _)| value)
}

fn recover(raw: &str, source_text: Option<&str>) -> Recovered {
    let cleaned = strip_reasoning(raw);

    if let Some((value, method)) = parse_stages(&cleaned) {
        debug!(?method, "recovered model output");
        return Recovered {
            value: ensure_envelope(value),
            method,
        };
    }

    warn!(raw_len = raw.len(), "model output unparseable; scraping text");
    Recovered {
        value: fallback_scrape(source_text.unwrap_or(&cleaned)),
        method: ExtractionMethod::Fallback,
    }
}

/// How much of a record a parsed object carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Richness {
    Empty,
    Fields,
    Envelope,
}

fn richness(value: &Value) -> Richness {
    match value.as_object() {
        Some(object) if object.contains_key("metadata") || object.contains_key("content") => {
            Richness::Envelope
        }
        Some(object) if !object.is_empty() => Richness::Fields,
        _ => Richness::Empty,
    }
}

fn parse_stages(cleaned: &str) -> Option<(Value, ExtractionMethod)> {
    let mut best: Option<(Richness, Value, ExtractionMethod)> = None;

    for candidate in candidate_spans(cleaned) {
        let Some((value, method)) = parse_span(&candidate) else {
            continue;
        };
        let rank = richness(&value);
        if rank == Richness::Envelope {
            return Some((value, method));
        }
        if best.as_ref().map_or(true, |(current, ..)| rank > *current) {
            best = Some((rank, value, method));
        }
    }

    best.map(|(_, value, method)| (value, method))
}

/// Texts that may hold the object, most specific first, without repeats.
fn candidate_spans(text: &str) -> Vec<String> {
    let fences: Vec<(bool, &str)> = FENCED
        .captures_iter(text)
        .filter_map(|captures| {
            let body = captures.get(2)?.as_str();
            let is_json = captures
                .get(1)
                .is_some_and(|lang| lang.as_str().eq_ignore_ascii_case("json"));
            Some((is_json, body))
        })
        .collect();

    let json_first = fences
        .iter()
        .filter(|(is_json, _)| *is_json)
        .chain(fences.iter().filter(|(is_json, _)| !*is_json))
        .map(|(_, body)| body.to_string());

    let mut spans: Vec<String> = Vec::new();
    for span in json_first.chain([
        FENCED.replace_all(text, "\n").into_owned(),
        FENCE_MARKER.replace_all(text, "").into_owned(),
    ]) {
        if !spans.contains(&span) {
            spans.push(span);
        }
    }
    spans
}

fn parse_span(text: &str) -> Option<(Value, ExtractionMethod)> {
    let span = isolate_object(text)?;

    if let Some(value) = parse_object(span) {
        return Some((value, ExtractionMethod::Model));
    }

    let repaired = repair(span);
    if let Some(value) = parse_object(&repaired) {
        return Some((value, ExtractionMethod::Repaired));
    }

    let content = content_object(span)
        .and_then(|object| parse_object(object).or_else(|| parse_object(&repair(object))))
        .or_else(|| content_object(&repaired).and_then(parse_object))?;

    Some((
        json!({ "metadata": {}, "content": content }),
        ExtractionMethod::ContentOnly,
    ))
}

fn strip_reasoning(raw: &str) -> String {
    let without_blocks = REASONING.replace_all(raw, "");
    match without_blocks.rfind("</think>") {
        Some(end) => without_blocks[end + "</think>".len()..].to_string(),
        None => without_blocks.into_owned(),
    }
}

fn isolate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Textual repairs for the slips models make most often. Applied in a fixed
/// order; each is a plain regex rewrite.
pub fn repair(text: &str) -> String {
    let text = text.replace(r"\\\\", r"\\");
    let text = QUOTE_NEWLINE_QUOTE.replace_all(&text, "\",${1}\"");
    let text = SCALAR_NEWLINE_QUOTE.replace_all(&text, "${1},${2}\"");
    let text = CLOSER_NEWLINE_OPENER.replace_all(&text, "${1},${2}${3}");
    let text = TRAILING_COMMA.replace_all(&text, "${1}");
    let text = BARE_KEY.replace_all(&text, "${1}\"${2}\"${3}");
    let text = STRAY_BACKSLASH.replace_all(&text, r"${1}\\${2}");
    text.into_owned()
}

/// Balanced `{...}` following the first `"content":` key, honouring string
/// literals and escapes.
fn content_object(text: &str) -> Option<&str> {
    let key = CONTENT_KEY.find(text)?;
    let start = key.end() - 1;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn ensure_envelope(value: Value) -> Value {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            let mut object = Map::new();
            object.insert("content".into(), json!({ "summary": other.to_string() }));
            object
        }
    };

    if !object.get("metadata").is_some_and(Value::is_object) {
        object.insert("metadata".into(), Value::Object(Map::new()));
    }
    if !object.contains_key("content") {
        object.insert(
            "content".into(),
            json!({ "summary": "", "key_concepts": [], "practice_questions": [] }),
        );
    }
    Value::Object(object)
}

/// Last-resort record built from definition-like and question-like sentences
/// in `text`.
pub fn fallback_scrape(text: &str) -> Value {
    let mut concepts = Vec::new();
    for pattern in DEFINITION_PATTERNS.iter() {
        for captures in pattern.captures_iter(text) {
            let concept = match (captures.get(1), captures.get(2)) {
                (Some(term), Some(definition)) => json!({
                    "concept_name": term.as_str().trim(),
                    "definition": definition.as_str().trim(),
                }),
                (Some(definition), None) => json!({
                    "concept_name": "Definition",
                    "definition": definition.as_str().trim(),
                }),
                _ => continue,
            };
            concepts.push(concept);
        }
    }

    for captures in FORMULA.captures_iter(text) {
        let formula = format!("{} = {}", captures[1].trim(), captures[2].trim());
        concepts.push(json!({
            "concept_name": "Formula",
            "definition": "",
            "formulas": [formula],
        }));
    }

    let questions: Vec<Value> = QUESTION_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.find_iter(text))
        .take(MAX_FALLBACK_QUESTIONS)
        .map(|found| {
            json!({
                "question_text": found.as_str().trim(),
                "difficulty_level": "Medium",
                "solution": "",
            })
        })
        .collect();

    concepts.truncate(MAX_FALLBACK_CONCEPTS);

    json!({
        "metadata": {},
        "content": {
            "summary": summarize(text),
            "key_concepts": concepts,
            "practice_questions": questions,
        },
        "related_topics": [],
        "extraction_method": "fallback",
    })
}

fn summarize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > FALLBACK_SUMMARY_CHARS {
        let head: String = trimmed.chars().take(FALLBACK_SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_envelope(value: &Value) -> bool {
        value.get("metadata").is_some_and(Value::is_object) && value.get("content").is_some()
    }

    #[test]
    fn prose_and_fences_are_discarded() {
        let raw = "Here is the JSON:\n```json\n{\"metadata\": {\"topic\": \"Vectors\"}, \"content\": {\"summary\": \"Dot products\"}}\n```\nHope this helps!";
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Model);
        assert_eq!(recovered.value["metadata"]["topic"], "Vectors");
        assert_eq!(recovered.value["content"]["summary"], "Dot products");
    }

    #[test]
    fn json_fence_wins_over_earlier_code_fences() {
        let raw = "Sets can be written in Python:\n```python\ns = {1, 2}\nd = {}\n```\nAnswer:\n```json\n{\"metadata\": {\"topic\": \"Sets\"}, \"content\": {\"summary\": \"Unions\"}}\n```";
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Model);
        assert_eq!(recovered.value["metadata"]["topic"], "Sets");
        assert_eq!(recovered.value["content"]["summary"], "Unions");
    }

    #[test]
    fn unfenced_record_beats_an_empty_object_in_a_fence() {
        let raw = "Example:\n```\nf = {}\n```\n{\"metadata\": {\"topic\": \"Sets\"}, \"content\": {\"summary\": \"Unions\"}}";
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Model);
        assert_eq!(recovered.value["metadata"]["topic"], "Sets");
        assert_eq!(recovered.value["content"]["summary"], "Unions");
    }

    #[test]
    fn lenient_parse_prefers_populated_objects() {
        let raw = "```\nx = {}\n```\n{\"generated_questions\": []}";
        let value = parse_lenient(raw);

        assert!(value.is_some_and(|value| value.get("generated_questions").is_some()));
    }

    #[test]
    fn reasoning_blocks_are_ignored() {
        let raw = "<think>maybe {\"metadata\": 1}? let me check</think>\n{\"metadata\": {}, \"content\": {\"summary\": \"ok\"}}";
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Model);
        assert_eq!(recovered.value["content"]["summary"], "ok");
    }

    #[test]
    fn missing_comma_between_keys_is_repaired() {
        let raw = "{\n  \"metadata\": {\"topic\": \"Limits\"}\n  \"content\": {\n    \"summary\": \"Epsilon-delta\"\n    \"key_concepts\": []\n  }\n}";
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Repaired);
        assert_eq!(recovered.value["metadata"]["topic"], "Limits");
        assert_eq!(recovered.value["content"]["summary"], "Epsilon-delta");
    }

    #[test]
    fn missing_comma_after_scalar_is_repaired() {
        let raw = "{\"metadata\": {\"year\": 2021\n\"pages\": 4}, \"content\": {\"summary\": \"s\"}}";
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Repaired);
        assert_eq!(recovered.value["metadata"]["pages"], 4);
    }

    #[test]
    fn trailing_commas_and_bare_keys_are_repaired() {
        let raw = "{metadata: {topic: \"Sets\",}, content: {summary: \"Unions\", key_concepts: [],},}";
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Repaired);
        assert_eq!(recovered.value["metadata"]["topic"], "Sets");
        assert_eq!(recovered.value["content"]["summary"], "Unions");
    }

    #[test]
    fn stray_backslashes_are_escaped() {
        let raw = r#"{"metadata": {}, "content": {"summary": "Use \alpha here"}}"#;
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::Repaired);
        assert_eq!(recovered.value["content"]["summary"], r"Use \alpha here");
    }

    #[test]
    fn content_object_is_salvaged_alone() {
        let raw = r#"{"metadata": {"topic": broken broken}, "content": {"summary": "Kept {braces}", "key_concepts": []}}"#;
        let recovered = extract_and_repair(raw);

        assert_eq!(recovered.method, ExtractionMethod::ContentOnly);
        assert_eq!(recovered.value["content"]["summary"], "Kept {braces}");
        assert!(recovered.value["metadata"].as_object().is_some_and(Map::is_empty));
    }

    #[test]
    fn unparseable_output_falls_back_to_scrape() {
        let raw = "The model refused. Limit: the value a function approaches. 1. What is the limit of x as x tends to 2?";
        let recovered = extract_and_repair(raw);

        assert!(recovered.is_fallback());
        assert_eq!(recovered.value["extraction_method"], "fallback");
        let concepts = recovered.value["content"]["key_concepts"].as_array().unwrap();
        assert_eq!(concepts[0]["concept_name"], "Limit");
        assert_eq!(concepts[0]["definition"], "the value a function approaches.");
        let questions = recovered.value["content"]["practice_questions"].as_array().unwrap();
        assert_eq!(questions.len(), 1);
        assert!(questions[0]["question_text"].as_str().unwrap().starts_with("1. What"));
    }

    #[test]
    fn scrape_respects_caps_and_source_text() {
        let source = "1. One?\n2. Two?\n3. Three?\n4. Four?\nAlpha: a.\nBeta: b.\nGamma: c.\nDelta: d.\nEpsilon: e.\nZeta: f.";
        let recovered = recover_with_source("no json here", source);

        let content = &recovered.value["content"];
        assert_eq!(content["practice_questions"].as_array().unwrap().len(), 3);
        assert_eq!(content["key_concepts"].as_array().unwrap().len(), 5);
        assert!(content["summary"].as_str().unwrap().starts_with("1. One?"));
    }

    #[test]
    fn long_summary_is_truncated() {
        let text = "x".repeat(450);
        let value = fallback_scrape(&text);
        let summary = value["content"]["summary"].as_str().unwrap();
        assert_eq!(summary.chars().count(), FALLBACK_SUMMARY_CHARS + 3);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn recovery_is_total() {
        for raw in ["", "}{", "{{{", "```", "<think>", "[1, 2, 3]", "{\"content\": 5}", "null"] {
            let recovered = extract_and_repair(raw);
            assert!(has_envelope(&recovered.value), "input {raw:?}");
        }
    }

    #[test]
    fn lenient_parse_reports_absence() {
        assert!(parse_lenient("nothing structured").is_none());
        assert_eq!(parse_lenient("{\"a\": 1,}").unwrap()["a"], 1);
    }
}
