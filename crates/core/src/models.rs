use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Functional category of a document, inferred from its file name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "question_paper")]
    Question,
    #[serde(rename = "solution")]
    Solution,
    #[serde(rename = "standalone_note")]
    Note,
    #[serde(rename = "combined_question_solution")]
    Combined,
    #[serde(rename = "notes_with_solutions")]
    NoteWithSolutions,
    #[serde(rename = "notes_with_questions")]
    NoteWithQuestions,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Question => "question_paper",
            Role::Solution => "solution",
            Role::Note => "standalone_note",
            Role::Combined => "combined_question_solution",
            Role::NoteWithSolutions => "notes_with_solutions",
            Role::NoteWithQuestions => "notes_with_questions",
            Role::Unknown => "unknown",
        }
    }

    pub fn is_solution_like(self) -> bool {
        matches!(self, Role::Solution | Role::NoteWithSolutions)
    }

    pub fn is_question_like(self) -> bool {
        matches!(self, Role::Question | Role::NoteWithQuestions)
    }

    /// One side answers what the other asks.
    pub fn complements(self, other: Role) -> bool {
        (self.is_solution_like() && other.is_question_like())
            || (self.is_question_like() && other.is_solution_like())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub filename: String,
    pub role: Role,
    pub base_tokens: BTreeSet<String>,
}

impl DocumentRecord {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let role = crate::classifier::classify(&filename);
        let base_tokens = crate::similarity::base_tokens(&filename);
        Self {
            filename,
            role,
            base_tokens,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub a: &'a DocumentRecord,
    pub b: &'a DocumentRecord,
    pub score: f64,
}

/// Outcome of one pairing run. Every input file lands in exactly one pair or in
/// `unpaired`; pairs are ordered `(question side, solution side)`.
#[derive(Debug, Clone, Default)]
pub struct PairingResult {
    pub pairs: Vec<(DocumentRecord, DocumentRecord)>,
    pub unpaired: Vec<DocumentRecord>,
}

impl PairingResult {
    pub fn file_count(&self) -> usize {
        self.pairs.len() * 2 + self.unpaired.len()
    }

    pub fn pair_names(&self) -> Vec<(&str, &str)> {
        self.pairs
            .iter()
            .map(|(question, solution)| (question.filename.as_str(), solution.filename.as_str()))
            .collect()
    }

    pub fn unpaired_names(&self) -> Vec<&str> {
        self.unpaired
            .iter()
            .map(|record| record.filename.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PairingOptions {
    pub threshold: f64,
    pub role_agnostic_fallback: bool,
}

pub const DEFAULT_PAIRING_THRESHOLD: f64 = 0.7;

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PAIRING_THRESHOLD,
            role_agnostic_fallback: false,
        }
    }
}

/// How a record's JSON was obtained, ordered from cleanest to most degraded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Model,
    Repaired,
    ContentOnly,
    Fallback,
    StructuredFallback,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordContent {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_concepts: Vec<Value>,
    #[serde(default)]
    pub practice_questions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Final JSON-shaped output for one file or one question/solution pair.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedRecord {
    pub metadata: Map<String, Value>,
    pub content: RecordContent,
    #[serde(default)]
    pub related_topics: Vec<String>,
    pub relationships: Option<Map<String, Value>>,
    pub syllabus_mapping: Option<Value>,
    pub extraction_method: Option<ExtractionMethod>,
}

impl ExtractedRecord {
    /// Builds a record from loosely-shaped model output, coercing fields that
    /// came back with the wrong JSON type instead of rejecting the document.
    pub fn from_value(value: Value) -> Self {
        let mut object = match value {
            Value::Object(object) => object,
            _ => Map::new(),
        };

        let metadata = match object.remove("metadata") {
            Some(Value::Object(metadata)) => metadata,
            _ => Map::new(),
        };

        let content = match object.remove("content") {
            Some(Value::Object(mut content)) => {
                let summary = match content.remove("summary") {
                    Some(Value::String(text)) => text,
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                RecordContent {
                    summary,
                    key_concepts: into_list(content.remove("key_concepts")),
                    practice_questions: into_list(content.remove("practice_questions")),
                    extra: content,
                }
            }
            Some(Value::String(summary)) => RecordContent {
                summary,
                ..RecordContent::default()
            },
            _ => RecordContent::default(),
        };

        let related_topics = into_list(object.remove("related_topics"))
            .into_iter()
            .filter_map(|topic| match topic {
                Value::String(topic) => Some(topic),
                _ => None,
            })
            .collect();

        let relationships = match object.remove("relationships") {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };

        let syllabus_mapping = object.remove("syllabus_mapping").filter(|v| !v.is_null());

        let extraction_method = object
            .remove("extraction_method")
            .and_then(|method| serde_json::from_value(method).ok());

        Self {
            metadata,
            content,
            related_topics,
            relationships,
            syllabus_mapping,
            extraction_method,
        }
    }

    /// Overlays locally extracted metadata on whatever the model reported.
    pub fn merge_metadata(&mut self, metadata: &Map<String, Value>) {
        for (key, value) in metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}

fn into_list(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}

/// One embedded slice of a document, shaped for a vector store upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentChunk {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl ContentChunk {
    pub fn text(&self) -> &str {
        self.metadata
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// One nearest-neighbour hit from a vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f64,
    pub metadata: Map<String, Value>,
}

impl QueryMatch {
    pub fn text(&self) -> &str {
        self.metadata
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub points: u64,
    pub dimensions: Option<usize>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_from_value_coerces_loose_shapes() {
        let record = ExtractedRecord::from_value(json!({
            "metadata": {"topic": "Vectors"},
            "content": {
                "summary": 42,
                "key_concepts": {"concept_name": "Dot product"},
                "practice_questions": null,
                "worked_examples": []
            },
            "related_topics": ["Planes", 7],
            "extraction_method": "fallback"
        }));

        assert_eq!(record.metadata["topic"], "Vectors");
        assert_eq!(record.content.summary, "42");
        assert_eq!(record.content.key_concepts.len(), 1);
        assert!(record.content.practice_questions.is_empty());
        assert!(record.content.extra.contains_key("worked_examples"));
        assert_eq!(record.related_topics, vec!["Planes".to_string()]);
        assert_eq!(record.extraction_method, Some(ExtractionMethod::Fallback));
    }

    #[test]
    fn record_serialization_skips_absent_optionals() {
        let record = ExtractedRecord::default();
        let value = serde_json::to_value(&record).expect("record serializes");

        assert!(value.get("metadata").is_some());
        assert!(value.pointer("/content/summary").is_some());
        assert!(value.get("relationships").is_none());
        assert!(value.get("extraction_method").is_none());
    }

    #[test]
    fn complementary_roles() {
        assert!(Role::Question.complements(Role::Solution));
        assert!(Role::NoteWithSolutions.complements(Role::Question));
        assert!(!Role::Solution.complements(Role::Solution));
        assert!(!Role::Combined.complements(Role::Question));
        assert!(!Role::Unknown.complements(Role::Solution));
    }
}
