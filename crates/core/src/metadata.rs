use crate::classifier::{self, name_tokens};
use crate::error::Result;
use crate::models::Role;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_SUBJECT: &str = "Mathematics";
pub const JC_LEVEL: &str = "JC / A Level";
pub const SECONDARY_LEVEL: &str = "Secondary / O Level";

const KNOWN_SCHOOLS: &[&str] = &["SAJC", "SRJC", "TJC", "TMJC", "TPJC", "VJC", "YIJC", "YJC", "RI"];

const TOPIC_KEYWORDS: &[&str] = &[
    "trigonometry",
    "calculus",
    "vectors",
    "complex",
    "probability",
    "statistics",
    "functions",
    "sequences",
    "series",
    "matrices",
];

static TOPIC_HEADINGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)chapter\s*\d+\s*:\s*([\w ]+)",
        r"(?i)topic\s*\d*\s*:\s*([\w ]+)",
        r"(?i)section\s*\d+\s*:\s*([\w ]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("topic heading regex is valid"))
    .collect()
});

static SCHOOL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,4}JC$").expect("school code regex is valid"));

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"20\d{2}").expect("year regex is valid"));

/// Descriptive fields derived from a file's name, size and text.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub filename: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub processed_date: String,
    pub subject: String,
    pub topic: String,
    pub education_level: String,
    pub school: Option<String>,
    pub year: Option<String>,
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub content_type: Role,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl DocumentMetadata {
    pub fn from_file(path: &Path, text: &str) -> Result<Self> {
        let file_size_bytes = std::fs::metadata(path)?.len();
        Ok(Self::describe(path, file_size_bytes, text))
    }

    pub fn describe(path: &Path, file_size_bytes: u64, text: &str) -> Self {
        let display = path.to_string_lossy();
        let filename = classifier::base_name(&display).to_string();
        let stem = classifier::stem(&display).to_string();
        let lowered_name = filename.to_lowercase();

        Self {
            file_path: display.to_string(),
            file_size_bytes,
            processed_date: Utc::now().to_rfc3339(),
            subject: subject_for(&lowered_name).to_string(),
            topic: topic_heading(text).unwrap_or_else(|| stem.clone()),
            education_level: education_level(&lowered_name, text).to_string(),
            school: school_code(&stem),
            year: YEAR.find(&stem).map(|found| found.as_str().to_string()),
            document_type: document_type(&lowered_name).map(str::to_string),
            content_type: classifier::classify(&filename),
            topics: TOPIC_KEYWORDS
                .iter()
                .filter(|keyword| lowered_name.contains(*keyword))
                .map(|keyword| keyword.to_string())
                .collect(),
            filename,
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn subject_for(lowered_name: &str) -> &'static str {
    if lowered_name.contains("math") {
        "Mathematics"
    } else if lowered_name.contains("physics") {
        "Physics"
    } else if lowered_name.contains("chem") {
        "Chemistry"
    } else if lowered_name.contains("bio") {
        "Biology"
    } else if lowered_name.contains("econs") || lowered_name.contains("economics") {
        "Economics"
    } else {
        DEFAULT_SUBJECT
    }
}

fn topic_heading(text: &str) -> Option<String> {
    TOPIC_HEADINGS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|topic| topic.as_str().trim().to_string())
            .filter(|topic| !topic.is_empty())
    })
}

fn education_level(lowered_name: &str, text: &str) -> &'static str {
    let lowered_text = text.to_lowercase();
    if lowered_name.contains("jc")
        || lowered_text.contains("jc")
        || lowered_text.contains("a level")
    {
        JC_LEVEL
    } else if lowered_name.contains("secondary")
        || lowered_text.contains("secondary")
        || lowered_text.contains("o level")
    {
        SECONDARY_LEVEL
    } else {
        JC_LEVEL
    }
}

fn school_code(stem: &str) -> Option<String> {
    let tokens: Vec<&str> = stem
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();

    tokens
        .iter()
        .find(|token| KNOWN_SCHOOLS.contains(token))
        .or_else(|| tokens.iter().find(|token| SCHOOL_CODE.is_match(token)))
        .map(|token| token.to_string())
}

fn document_type(lowered_name: &str) -> Option<&'static str> {
    let tokens = name_tokens(lowered_name);
    let has = |word: &str| tokens.iter().any(|token| token.contains(word));

    if has("notes") {
        Some("notes")
    } else if has("paper") || has("prelim") {
        Some("past paper")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn filename_fields_are_extracted() {
        let meta = DocumentMetadata::describe(
            Path::new("/data/2021 SAJC H2 Math Prelim P1 Qn.pdf"),
            1024,
            "Answer all questions.",
        );

        assert_eq!(meta.filename, "2021 SAJC H2 Math Prelim P1 Qn.pdf");
        assert_eq!(meta.subject, "Mathematics");
        assert_eq!(meta.school.as_deref(), Some("SAJC"));
        assert_eq!(meta.year.as_deref(), Some("2021"));
        assert_eq!(meta.document_type.as_deref(), Some("past paper"));
        assert_eq!(meta.content_type, Role::Question);
        assert_eq!(meta.education_level, JC_LEVEL);
        assert_eq!(meta.topic, "2021 SAJC H2 Math Prelim P1 Qn");
    }

    #[test]
    fn topic_comes_from_first_heading() {
        let meta = DocumentMetadata::describe(
            Path::new("physics_notes.pdf"),
            0,
            "Intro\nChapter 4: Kinematics\nTopic 2: Forces",
        );

        assert_eq!(meta.topic, "Kinematics");
        assert_eq!(meta.subject, "Physics");
        assert_eq!(meta.document_type.as_deref(), Some("notes"));
    }

    #[test]
    fn generic_school_codes_and_topic_keywords() {
        let meta = DocumentMetadata::describe(
            Path::new("ACJC_vectors_and_complex_numbers.pdf"),
            0,
            "O Level refresher",
        );

        assert_eq!(meta.school.as_deref(), Some("ACJC"));
        assert_eq!(meta.topics, vec!["vectors".to_string(), "complex".to_string()]);
        assert_eq!(meta.year, None);
    }

    #[test]
    fn secondary_level_is_detected_from_text() {
        let meta =
            DocumentMetadata::describe(Path::new("algebra.pdf"), 0, "Secondary Three algebra");
        assert_eq!(meta.education_level, SECONDARY_LEVEL);
    }

    #[test]
    fn from_file_reads_size_and_serializes() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("Trigonometry Notes.pdf");
        fs::write(&path, b"12345")?;

        let meta = DocumentMetadata::from_file(&path, "")?;
        let map = meta.to_map();

        assert_eq!(map["file_size_bytes"], 5);
        assert_eq!(map["type"], "notes");
        assert_eq!(map["content_type"], "standalone_note");
        assert!(map.get("school").is_none());
        Ok(())
    }
}
