//! Prompt text for the conversion and enrichment calls.

use crate::metadata::{DEFAULT_SUBJECT, JC_LEVEL};
use crate::models::ExtractedRecord;
use serde_json::{Map, Value};

const PAIR_EXCERPT_CHARS: usize = 5000;
const SYLLABUS_EXCERPT_CHARS: usize = 2000;
const MAPPING_CONTENT_CHARS: usize = 1000;
const RELATIONSHIP_SYLLABUS_CHARS: usize = 1000;
const GENERATION_CONCEPTS: usize = 5;
const CLASSIFICATION_EXCERPT_CHARS: usize = 2000;

const RECORD_SKELETON: &str = r#"{
  "metadata": {
    "subject": "string",
    "topic": "string",
    "subtopic": "string",
    "education_level": "string",
    "syllabus_reference": "string"
  },
  "content": {
    "summary": "string",
    "key_concepts": [
      {
        "concept_name": "string",
        "definition": "string",
        "explanation": "string",
        "formulas": ["string"],
        "examples": [
          {
            "problem_statement": "string",
            "solution_steps": ["string"],
            "final_answer": "string"
          }
        ]
      }
    ],
    "practice_questions": [
      {
        "question_text": "string",
        "difficulty_level": "Easy | Medium | Hard",
        "solution": {"steps": ["string"], "final_answer": "string"},
        "hints": ["string"]
      }
    ]
  },
  "relationships": {
    "prerequisites": ["string"],
    "related_topics": ["string"]
  },
  "related_topics": ["string"]
}"#;

const PAIR_SKELETON: &str = r#"{
  "content": {
    "summary": "string",
    "key_concepts": [{"concept_name": "string", "definition": "string"}],
    "practice_questions": [
      {
        "question_number": 1,
        "question_text": "string",
        "solution": "string",
        "difficulty_level": "Easy | Medium | Hard"
      }
    ]
  }
}"#;

const JSON_ONLY: &str = "Return ONLY the JSON object, with no commentary before or after it.";

fn field<'a>(metadata: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    metadata.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Extraction prompt for one chunk of a notes-style document. A caller schema
/// replaces the built-in skeleton verbatim.
pub fn notes_prompt(
    text: &str,
    metadata: &Map<String, Value>,
    schema_hint: Option<&str>,
) -> String {
    let subject = field(metadata, "subject", DEFAULT_SUBJECT);
    let level = field(metadata, "education_level", JC_LEVEL);
    let structure = match schema_hint {
        Some(schema) => format!("Use the following JSON schema:\n{schema}"),
        None => format!("Use the following JSON structure:\n{RECORD_SKELETON}"),
    };

    format!(
        "You are an experienced {subject} teacher preparing material for {level} students. \
Turn the course content below into structured JSON for a tutoring system that retrieves it later.

DOCUMENT:
- Subject: {subject}
- Topic: {topic}
- Education Level: {level}
- Filename: {filename}

WHAT TO EXTRACT:
1. The main topic and its subtopics.
2. Key concepts with a short definition, a student-level explanation and every formula.
3. Worked examples, keeping each step.
4. Practice questions with solutions, a difficulty (Easy, Medium, Hard) and hints.
5. Prerequisites and related topics.
6. A concise summary of the whole passage.

Keep mathematical notation intact and do not invent content that is not in the text.

{structure}

CONTENT:
{text}

{JSON_ONLY}",
        topic = field(metadata, "topic", "Unknown"),
        filename = field(metadata, "filename", "Unknown"),
    )
}

/// Prompt asking the model to line up questions with their worked solutions.
pub fn pair_prompt(
    question_text: &str,
    solution_text: &str,
    metadata: &Map<String, Value>,
) -> String {
    format!(
        "You are reviewing a {subject} question paper together with its solutions. \
Match every question to its solution.

QUESTION DOCUMENT:
{questions}

SOLUTION DOCUMENT:
{solutions}

Produce:
1. A short summary of the topics the paper covers.
2. The key concepts it tests.
3. Every question with its full text, the matching solution and a difficulty (Easy, Medium, Hard).

Use this JSON structure:
{PAIR_SKELETON}

{JSON_ONLY}",
        subject = field(metadata, "subject", DEFAULT_SUBJECT),
        questions = excerpt(question_text, PAIR_EXCERPT_CHARS),
        solutions = excerpt(solution_text, PAIR_EXCERPT_CHARS),
    )
}

/// Asks the model whether a document is a question paper, a solution file or
/// a standalone note.
pub fn classification_prompt(text: &str) -> String {
    format!(
        "Analyze the following text extracted from a PDF file and decide which kind of \
course document it is:
1. question_paper: a question paper or worksheet that poses problems for students.
2. solution: a solution file with worked answers to questions.
3. standalone_note: lecture notes or reference material that is neither of the above.

TEXT FROM PDF (first pages):
{text}

Look at how the text is laid out. Numbered problems with marks and blank space suggest a \
question paper. Step-by-step working and final answers suggest solutions. Explanations, \
definitions and theory suggest notes.

Use this JSON structure:
{{
  \"classification\": \"question_paper | solution | standalone_note\",
  \"confidence\": 0.0,
  \"reasoning\": \"string\"
}}

{JSON_ONLY}",
        text = excerpt(text, CLASSIFICATION_EXCERPT_CHARS),
    )
}

pub fn syllabus_mapping_prompt(
    text: &str,
    syllabus_text: &str,
    metadata: &Map<String, Value>,
) -> String {
    format!(
        "You are a curriculum analyst for {subject}. Map the course content to the syllabus.

DOCUMENT:
- Subject: {subject}
- Topic: {topic}
- Education Level: {level}

SYLLABUS:
{syllabus}

CONTENT:
{content}

For each topic in the content give the syllabus reference, its description, the coverage \
(Complete, Partial or Minimal) and anything missing. Also list content beyond the syllabus \
and syllabus points the content does not cover.

Use this JSON structure:
{{
  \"syllabus_mapping\": [
    {{\"content_topic\": \"string\", \"syllabus_reference\": \"string\", \"syllabus_description\": \"string\", \"coverage_level\": \"string\", \"missing_elements\": [\"string\"]}}
  ],
  \"beyond_syllabus\": [{{\"content_topic\": \"string\", \"description\": \"string\"}}],
  \"syllabus_gaps\": [{{\"syllabus_reference\": \"string\", \"syllabus_description\": \"string\", \"importance\": \"string\"}}]
}}

{JSON_ONLY}",
        subject = field(metadata, "subject", DEFAULT_SUBJECT),
        topic = field(metadata, "topic", "Unknown"),
        level = field(metadata, "education_level", JC_LEVEL),
        syllabus = excerpt(syllabus_text, SYLLABUS_EXCERPT_CHARS),
        content = excerpt(text, MAPPING_CONTENT_CHARS),
    )
}

fn concept_names(record: &ExtractedRecord) -> impl Iterator<Item = (&str, &str)> {
    record.content.key_concepts.iter().map(|concept| {
        (
            concept.get("concept_name").and_then(Value::as_str).unwrap_or_default(),
            concept.get("definition").and_then(Value::as_str).unwrap_or_default(),
        )
    })
}

pub fn question_generation_prompt(record: &ExtractedRecord) -> String {
    let concepts = concept_names(record)
        .take(GENERATION_CONCEPTS)
        .map(|(name, definition)| format!("- {name}: {definition}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You write {subject} practice questions for {level} students.

TOPIC: {topic}

KEY CONCEPTS:
{concepts}

Write 5 new questions of mixed difficulty (Easy, Medium, Hard) covering different skills. \
For each give the question, a step-by-step solution, 2-3 hints, the concepts tested, \
an estimated time in minutes and the marks available.

Use this JSON structure:
{{
  \"generated_questions\": [
    {{
      \"question_id\": \"string\",
      \"question_text\": \"string\",
      \"difficulty_level\": \"string\",
      \"marks_available\": 0,
      \"time_estimate_minutes\": 0,
      \"concepts_tested\": [\"string\"],
      \"solution\": {{\"steps\": [\"string\"], \"final_answer\": \"string\"}},
      \"hints\": [\"string\"]
    }}
  ]
}}

{JSON_ONLY}",
        subject = field(&record.metadata, "subject", DEFAULT_SUBJECT),
        level = field(&record.metadata, "education_level", JC_LEVEL),
        topic = field(&record.metadata, "topic", "Unknown"),
    )
}

pub fn concept_relationship_prompt(
    record: &ExtractedRecord,
    syllabus_text: Option<&str>,
) -> String {
    let concepts = concept_names(record)
        .map(|(name, _)| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    let syllabus = syllabus_text
        .map(|text| {
            format!(
                "\nSYLLABUS CONTEXT:\n{}\n",
                excerpt(text, RELATIONSHIP_SYLLABUS_CHARS)
            )
        })
        .unwrap_or_default();

    format!(
        "You design {subject} curricula and know how concepts build on each other.

TOPIC: {topic}

CONCEPTS:
{concepts}
{syllabus}
For each concept list its prerequisites, related concepts, what it follows from and what it \
leads to, and rate it Foundational, Core or Advanced. Add missing concepts, a learning \
sequence and the most important links.

Use this JSON structure:
{{
  \"concept_relationships\": [
    {{\"concept\": \"string\", \"prerequisites\": [\"string\"], \"related_concepts\": [\"string\"], \"follows_from\": [\"string\"], \"leads_to\": [\"string\"], \"importance\": \"string\"}}
  ],
  \"missing_concepts\": [{{\"concept\": \"string\", \"description\": \"string\", \"relationship_to_existing\": \"string\"}}],
  \"learning_sequence\": [\"string\"],
  \"key_relationships\": [{{\"from_concept\": \"string\", \"to_concept\": \"string\", \"relationship_type\": \"string\", \"importance\": \"string\"}}]
}}

{JSON_ONLY}",
        subject = field(&record.metadata, "subject", DEFAULT_SUBJECT),
        topic = field(&record.metadata, "topic", "Unknown"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata() -> Map<String, Value> {
        match json!({"subject": "Mathematics", "topic": "Vectors", "filename": "vectors.pdf"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn notes_prompt_uses_schema_hint_verbatim() {
        let with_hint = notes_prompt("body text", &metadata(), Some("{\"custom\": true}"));
        assert!(with_hint.contains("{\"custom\": true}"));
        assert!(!with_hint.contains("\"key_concepts\""));
        assert!(with_hint.contains("Topic: Vectors"));

        let default = notes_prompt("body text", &metadata(), None);
        assert!(default.contains("\"practice_questions\""));
        assert!(default.contains("body text"));
    }

    #[test]
    fn classification_prompt_lists_the_labels_and_caps_the_text() {
        let long = "t".repeat(CLASSIFICATION_EXCERPT_CHARS + 10);
        let prompt = classification_prompt(&long);

        for label in ["question_paper", "solution", "standalone_note"] {
            assert!(prompt.contains(label), "missing {label}");
        }
        assert!(prompt.contains(&"t".repeat(CLASSIFICATION_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"t".repeat(CLASSIFICATION_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn pair_prompt_caps_each_document() {
        let long = "q".repeat(PAIR_EXCERPT_CHARS + 100);
        let prompt = pair_prompt(&long, "solutions", &metadata());

        assert!(prompt.contains(&"q".repeat(PAIR_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"q".repeat(PAIR_EXCERPT_CHARS + 1)));
        assert!(prompt.contains("solutions"));
    }

    #[test]
    fn enrichment_prompts_list_concepts() {
        let record = ExtractedRecord::from_value(json!({
            "metadata": {"topic": "Limits"},
            "content": {"key_concepts": [{"concept_name": "Continuity", "definition": "No jumps."}]}
        }));

        assert!(question_generation_prompt(&record).contains("- Continuity: No jumps."));
        let relationships = concept_relationship_prompt(&record, Some("9758 syllabus"));
        assert!(relationships.contains("- Continuity"));
        assert!(relationships.contains("9758 syllabus"));
        assert!(
            syllabus_mapping_prompt("text", "syllabus", &record.metadata).contains("Topic: Limits")
        );
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("αβγδ", 2), "αβ");
        assert_eq!(excerpt("ab", 5), "ab");
    }
}
