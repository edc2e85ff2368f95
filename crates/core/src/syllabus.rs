//! Structured syllabus data parsed from an H2 Mathematics style syllabus.
//!
//! The content outline becomes numbered topics and subtopics. Each one keeps
//! its plain content lines, the formulas found in them and the lines listed
//! under `Include:` and `Exclude:`. Exam format lines, aims, key concepts,
//! assessment objectives and difficulty notes are read from the whole text.

use crate::error::{IngestError, Result};
use crate::extractor::{extract_text, PdfExtractor};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

pub const DEFAULT_SYLLABUS_FILE: &str = "syllabus_data.json";

const OUTLINE_MARKER: &str = "CONTENT OUTLINE";
const AIMS_MARKER: &str = "SYLLABUS AIMS";
const OBJECTIVES_MARKER: &str = "ASSESSMENT OBJECTIVES";
const CALCULATOR_MARKER: &str = "USE OF A GRAPHING CALCULATOR";
const SKIPPED_TITLES: &[&str] = &["PAGE", "CONTENTS", "PREAMBLE"];

const MATH_FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "log", "ln", "exp", "sqrt", "lim", "sum", "prod", "int", "diff", "grad",
    "div", "curl", "det", "tr", "rank", "norm",
];

const QUESTION_TYPES: &[(&str, &[&str])] = &[
    ("proof", &["prove", "show", "demonstrate", "verify"]),
    ("calculation", &["calculate", "compute", "evaluate", "find"]),
    ("application", &["apply", "use", "implement", "solve"]),
    ("analysis", &["analyze", "examine", "investigate", "determine"]),
    ("explanation", &["explain", "describe", "justify", "interpret"]),
];

static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CLES\s*\d{4}").expect("course code regex is valid"));

static PAPER_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PAPER\s+(\d+)\s*\((\d+)\s*hours\)").expect("paper section regex is valid")
});

static TOPIC_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("topic number regex is valid"));

static MATH_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[∑∫∏√π±×÷=≠≤≥∈∉⊂⊃∪∩]|[a-zA-Z]\([^)]*\)|[0-9]+!|[a-zA-Z]+\s*=\s*[^=]+)")
        .expect("math expression regex is valid")
});

static TOPIC_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+([A-Za-z\s]+)").expect("topic heading regex is valid"));

static SUBTOPIC_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.\d+)\s+([A-Za-z\s]+)").expect("subtopic heading regex is valid")
});

static PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("page number regex is valid"));

static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Include:\s*(.*)").expect("include regex is valid"));

static EXCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Exclude:\s*(.*)").expect("exclude regex is valid"));

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"•\s*(.+)").expect("bullet regex is valid"));

static AIM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-d]\)").expect("aim regex is valid"));

static OBJECTIVE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AO\d+").expect("objective regex is valid"));

/// `<label>`, an optional colon, then the rest of the line.
fn labelled_line(label: &str) -> Regex {
    Regex::new(&format!(r"\b{label}:?[ \t]*([^\n]+)")).expect("labelled line regex is valid")
}

static FORMAT_LINE: LazyLock<Regex> = LazyLock::new(|| labelled_line("Format"));
static DURATION_LINE: LazyLock<Regex> = LazyLock::new(|| labelled_line("Duration"));
static WEIGHTAGE_LINE: LazyLock<Regex> = LazyLock::new(|| labelled_line("Weightage"));
static CALCULATOR_LINE: LazyLock<Regex> = LazyLock::new(|| labelled_line("Calculator"));
static LEARNING_OBJECTIVE_LINE: LazyLock<Regex> =
    LazyLock::new(|| labelled_line(r"Learning\s+Objectives?"));
static KEY_CONCEPT_LINE: LazyLock<Regex> = LazyLock::new(|| labelled_line(r"Key\s+Concepts?"));
static PREREQUISITE_LINE: LazyLock<Regex> = LazyLock::new(|| labelled_line("Prerequisites?"));
static DIFFICULTY_LINE: LazyLock<Regex> = LazyLock::new(|| labelled_line("Difficulty"));
static QUESTION_TYPE_LINE: LazyLock<Regex> =
    LazyLock::new(|| labelled_line(r"Question\s+Types?"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyllabusSubtopic {
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub formulas: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyllabusTopic {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub formulas: Vec<String>,
    #[serde(default)]
    pub subtopics: Vec<SyllabusSubtopic>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamFormat {
    pub format: Option<String>,
    pub duration: Option<String>,
    pub weightage: Option<String>,
    pub calculator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConcept {
    pub concept: String,
    pub mathematical_expressions: Vec<String>,
    pub related_topics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentPattern {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyLevels {
    pub overall: String,
    /// Keyed by the last topic number seen before each difficulty line.
    pub by_topic: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyllabusMetadata {
    pub source_file: String,
    pub processed_date: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyllabusData {
    pub course_code: String,
    pub course_name: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub topics: Vec<SyllabusTopic>,
    #[serde(default)]
    pub exam_format: ExamFormat,
    #[serde(default)]
    pub key_concepts: Vec<KeyConcept>,
    #[serde(default)]
    pub common_questions: Vec<AssessmentPattern>,
    pub difficulty_levels: Option<DifficultyLevels>,
    pub metadata: Option<SyllabusMetadata>,
}

impl SyllabusData {
    /// Parses extracted syllabus text. `metadata` is left empty.
    pub fn from_text(text: &str) -> Self {
        Self {
            course_code: COURSE_CODE
                .find(text)
                .map(|code| code.as_str().to_string())
                .unwrap_or_default(),
            course_name: PAPER_SECTION
                .captures(text)
                .map(|paper| format!("Paper {} ({} hours)", &paper[1], &paper[2]))
                .unwrap_or_default(),
            objectives: learning_objectives(text),
            prerequisites: first_capture(&PREREQUISITE_LINE, text)
                .map(split_list)
                .unwrap_or_default(),
            topics: outline_topics(text),
            exam_format: exam_format(text),
            key_concepts: key_concepts(text),
            common_questions: assessment_patterns(text),
            difficulty_levels: first_capture(&DIFFICULTY_LINE, text).map(|overall| {
                DifficultyLevels {
                    overall: overall.to_string(),
                    by_topic: topic_difficulties(text),
                }
            }),
            metadata: None,
        }
    }
}

/// Which list of the current topic or subtopic plain lines go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Content,
    Include,
    Exclude,
}

struct Entry<'a> {
    content: &'a mut Vec<String>,
    formulas: &'a mut Vec<String>,
    include: &'a mut Vec<String>,
    exclude: &'a mut Vec<String>,
}

impl Entry<'_> {
    fn push(&mut self, section: Section, line: String) {
        match section {
            Section::Content => self.content.push(line),
            Section::Include => self.include.push(line),
            Section::Exclude => self.exclude.push(line),
        }
    }
}

fn current_entry(topic: &mut SyllabusTopic) -> Entry<'_> {
    match topic.subtopics.last_mut() {
        Some(subtopic) => Entry {
            content: &mut subtopic.content,
            formulas: &mut subtopic.formulas,
            include: &mut subtopic.include,
            exclude: &mut subtopic.exclude,
        },
        None => Entry {
            content: &mut topic.content,
            formulas: &mut topic.formulas,
            include: &mut topic.include,
            exclude: &mut topic.exclude,
        },
    }
}

fn clean_line(line: &str) -> String {
    line.replace('ﬁ', "fi")
        .replace('ﬂ', "fl")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Joins runs of consecutive lines that contain mathematical notation.
fn merge_math_lines(lines: Vec<String>) -> Vec<String> {
    let mut merged = Vec::with_capacity(lines.len());
    let mut pending = String::new();

    for line in lines {
        if !line.is_empty() && MATH_EXPRESSION.is_match(&line) {
            if !pending.is_empty() {
                pending.push(' ');
            }
            pending.push_str(&line);
            continue;
        }
        if !pending.is_empty() {
            merged.push(std::mem::take(&mut pending));
        }
        merged.push(line);
    }
    if !pending.is_empty() {
        merged.push(pending);
    }
    merged
}

/// Topics of the content outline. Lines before the `CONTENT OUTLINE` heading
/// are skipped when the heading exists.
pub fn outline_topics(text: &str) -> Vec<SyllabusTopic> {
    let lines = merge_math_lines(text.lines().map(clean_line).collect());
    let start = lines
        .iter()
        .position(|line| line.contains(OUTLINE_MARKER))
        .map_or(0, |index| index + 1);

    let mut topics: Vec<SyllabusTopic> = Vec::new();
    let mut section = Section::Content;

    for line in &lines[start..] {
        if line.is_empty() || PAGE_NUMBER.is_match(line) || line.to_uppercase().contains("PAGE") {
            continue;
        }

        if let Some(heading) = TOPIC_HEADING.captures(line) {
            let title = heading[2].trim();
            if title.len() < 2 || SKIPPED_TITLES.contains(&title.to_uppercase().as_str()) {
                continue;
            }
            let Ok(number) = heading[1].parse::<u32>() else {
                continue;
            };
            topics.push(SyllabusTopic {
                number,
                title: title.to_string(),
                ..SyllabusTopic::default()
            });
            section = Section::Content;
            continue;
        }

        let Some(topic) = topics.last_mut() else {
            continue;
        };

        if let Some(heading) = SUBTOPIC_HEADING.captures(line) {
            topic.subtopics.push(SyllabusSubtopic {
                number: heading[1].to_string(),
                title: heading[2].trim().to_string(),
                ..SyllabusSubtopic::default()
            });
            section = Section::Content;
            continue;
        }

        let mut entry = current_entry(topic);
        let body = if let Some(marker) = INCLUDE.captures(line) {
            section = Section::Include;
            marker[1].trim().to_string()
        } else if let Some(marker) = EXCLUDE.captures(line) {
            section = Section::Exclude;
            marker[1].trim().to_string()
        } else {
            line.clone()
        };

        entry.formulas.extend(formulas(&body));

        let bullet = BULLET.captures(&body).map(|bullet| bullet[1].trim().to_string());
        match bullet {
            Some(item) => {
                if !item.is_empty() {
                    entry.push(section, item);
                }
            }
            None => {
                if !body.is_empty() && !body.starts_with('(') && !body.ends_with(')') {
                    entry.push(section, body);
                }
            }
        }
    }

    debug!(topics = topics.len(), "syllabus outline parsed");
    topics
}

fn first_capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim())
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text after `start` up to the first `end` marker, or to the end of `text`.
fn section_after<'t>(text: &'t str, start: &str, end: &str) -> Option<&'t str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    Some(rest.find(end).map_or(rest, |to| &rest[..to]))
}

pub fn exam_format(text: &str) -> ExamFormat {
    let capture = |pattern: &Regex| first_capture(pattern, text).map(str::to_string);
    ExamFormat {
        format: capture(&FORMAT_LINE),
        duration: capture(&DURATION_LINE),
        weightage: capture(&WEIGHTAGE_LINE),
        calculator: capture(&CALCULATOR_LINE),
    }
}

/// Lettered aims from the `SYLLABUS AIMS` section followed by every
/// comma-separated `Learning Objective:` item.
pub fn learning_objectives(text: &str) -> Vec<String> {
    let mut objectives: Vec<String> = section_after(text, AIMS_MARKER, OBJECTIVES_MARKER)
        .map(|aims| {
            aims.lines()
                .map(str::trim)
                .filter(|line| AIM_LINE.is_match(line))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    for line in LEARNING_OBJECTIVE_LINE.captures_iter(text) {
        objectives.extend(split_list(&line[1]));
    }
    objectives
}

fn math_function_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| MATH_FUNCTIONS.contains(token))
}

fn formulas(text: &str) -> Vec<String> {
    MATH_EXPRESSION
        .find_iter(text)
        .map(|found| found.as_str().trim().to_string())
        .collect()
}

fn topic_numbers(text: &str) -> impl Iterator<Item = String> + '_ {
    TOPIC_NUMBER.find_iter(text).map(|found| found.as_str().to_string())
}

pub fn key_concepts(text: &str) -> Vec<KeyConcept> {
    KEY_CONCEPT_LINE
        .captures_iter(text)
        .map(|line| {
            let concept = line[1].trim();
            let mut related_topics: Vec<String> = topic_numbers(concept).collect();
            related_topics.extend(
                math_function_tokens(concept)
                    .map(|function| format!("Mathematical Function: {function}")),
            );
            KeyConcept {
                concept: concept.to_string(),
                mathematical_expressions: formulas(concept),
                related_topics,
            }
        })
        .collect()
}

/// `AO` lines of the assessment objectives plus every listed question type
/// that names one of the known question verbs.
pub fn assessment_patterns(text: &str) -> Vec<AssessmentPattern> {
    let objectives = section_after(text, OBJECTIVES_MARKER, CALCULATOR_MARKER).unwrap_or_default();
    let mut patterns: Vec<AssessmentPattern> = objectives
        .lines()
        .map(str::trim)
        .filter(|line| OBJECTIVE_LINE.is_match(line))
        .map(|line| {
            let lowered = line.to_lowercase();
            let mut keywords: Vec<String> =
                math_function_tokens(&lowered).map(str::to_string).collect();
            keywords.extend(topic_numbers(line));
            AssessmentPattern {
                kind: "assessment_objective".to_string(),
                description: line.to_string(),
                keywords,
            }
        })
        .collect();

    for line in QUESTION_TYPE_LINE.captures_iter(text) {
        for question_type in split_list(&line[1]) {
            let lowered = question_type.to_lowercase();
            for &(category, verbs) in QUESTION_TYPES {
                let keywords: Vec<String> = verbs
                    .iter()
                    .filter(|verb| lowered.contains(*verb))
                    .map(|verb| verb.to_string())
                    .collect();
                if !keywords.is_empty() {
                    patterns.push(AssessmentPattern {
                        kind: category.to_string(),
                        description: question_type.clone(),
                        keywords,
                    });
                }
            }
        }
    }
    patterns
}

fn topic_difficulties(text: &str) -> BTreeMap<String, String> {
    let mut difficulties = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if let Some(number) = TOPIC_NUMBER.find(line) {
            current = Some(number.as_str().to_string());
        } else if let Some(topic) = &current {
            if !line.to_lowercase().contains("difficulty") {
                continue;
            }
            if let Some((_, level)) = line.split_once(':') {
                difficulties.insert(topic.clone(), level.trim().to_string());
            }
        }
    }
    difficulties
}

/// Reads one syllabus PDF and stamps its source metadata.
pub fn process_syllabus(path: &Path, extractor: &dyn PdfExtractor) -> Result<SyllabusData> {
    info!(path = %path.display(), "processing syllabus");
    let text = extract_text(extractor, path, None)?;
    let mut data = SyllabusData::from_text(&text);
    data.metadata = Some(SyllabusMetadata {
        source_file: path.display().to_string(),
        processed_date: Utc::now().to_rfc3339(),
        file_type: path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default(),
    });
    Ok(data)
}

/// PDFs directly inside `source` when it is a directory, otherwise `source`
/// itself.
pub fn syllabus_files(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "syllabus source does not exist: {}",
            source.display()
        )));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(source)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Processes every file, skipping (and logging) the ones that fail.
pub fn process_syllabi(files: &[PathBuf], extractor: &dyn PdfExtractor) -> Vec<SyllabusData> {
    files
        .iter()
        .filter_map(|path| match process_syllabus(path, extractor) {
            Ok(data) => Some(data),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "syllabus skipped");
                None
            }
        })
        .collect()
}

pub fn write_syllabus_data(syllabi: &[SyllabusData], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(syllabi)?)?;
    Ok(())
}

pub fn read_syllabus_data(path: &Path) -> Result<Vec<SyllabusData>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PageText;
    use tempfile::tempdir;

    const SYLLABUS: &str = "MATHEMATICS (CLES 9758)
PAPER 1 (3 hours)
Format: Written paper with 10 to 12 questions
Duration: 3 hours
Weightage: 50%
Calculator: An approved graphing calculator is allowed
Prerequisites: O-Level Mathematics, Additional Mathematics
SYLLABUS AIMS
a) acquire mathematical concepts and skills
b) develop thinking and reasoning skills
ASSESSMENT OBJECTIVES
AO1 Understand and apply techniques including sin and cos in 1.2
AO2 Formulate problems into mathematical terms
USE OF A GRAPHING CALCULATOR
Learning Objectives: model situations, interpret results
Key Concept: derivative f(x) of 2.1
Question Types: Prove the identity, Find the area, Sketch the curve
Difficulty: Challenging
CONTENT OUTLINE
12
1 Functions and graphs
1.1 Functions
Include:
• concepts of function, domain and range
• inverse function
Exclude:
• functions with restricted domains
(notes for teachers)
1.2 Graphs and transformations
• y = f(x) and its graph
PAGE 7
2 Calculus
Rate of change of a quantity
";

    #[test]
    fn course_info_and_exam_format_are_read() {
        let data = SyllabusData::from_text(SYLLABUS);

        assert_eq!(data.course_code, "CLES 9758");
        assert_eq!(data.course_name, "Paper 1 (3 hours)");
        assert_eq!(data.exam_format.duration.as_deref(), Some("3 hours"));
        assert_eq!(data.exam_format.weightage.as_deref(), Some("50%"));
        assert!(data.exam_format.calculator.is_some_and(|policy| policy.contains("graphing")));
        assert_eq!(data.prerequisites, ["O-Level Mathematics", "Additional Mathematics"]);
    }

    #[test]
    fn outline_becomes_topics_with_include_and_exclude_lists() {
        let topics = SyllabusData::from_text(SYLLABUS).topics;

        let titles: Vec<&str> = topics.iter().map(|topic| topic.title.as_str()).collect();
        assert_eq!(titles, ["Functions and graphs", "Calculus"]);

        let functions = &topics[0].subtopics[0];
        assert_eq!(functions.number, "1.1");
        assert_eq!(functions.title, "Functions");
        assert_eq!(
            functions.include,
            ["concepts of function, domain and range", "inverse function"]
        );
        assert_eq!(functions.exclude, ["functions with restricted domains"]);
        assert!(functions.content.is_empty());

        let graphs = &topics[0].subtopics[1];
        assert_eq!(graphs.content, ["y = f(x) and its graph"]);
        assert!(!graphs.formulas.is_empty());

        assert_eq!(topics[1].number, 2);
        assert_eq!(topics[1].content, ["Rate of change of a quantity"]);
    }

    #[test]
    fn objectives_and_assessment_patterns_are_collected() {
        let data = SyllabusData::from_text(SYLLABUS);

        assert_eq!(
            data.objectives,
            [
                "a) acquire mathematical concepts and skills",
                "b) develop thinking and reasoning skills",
                "model situations",
                "interpret results",
            ]
        );

        let objectives: Vec<&AssessmentPattern> = data
            .common_questions
            .iter()
            .filter(|pattern| pattern.kind == "assessment_objective")
            .collect();
        assert_eq!(objectives.len(), 2);
        assert_eq!(objectives[0].keywords, ["sin", "cos", "1", "1.2"]);

        let kinds: Vec<&str> = data
            .common_questions
            .iter()
            .filter(|pattern| pattern.kind != "assessment_objective")
            .map(|pattern| pattern.kind.as_str())
            .collect();
        assert_eq!(kinds, ["proof", "calculation"]);
    }

    #[test]
    fn key_concepts_and_difficulty_are_read() {
        let data = SyllabusData::from_text(SYLLABUS);

        let concept = &data.key_concepts[0];
        assert_eq!(concept.concept, "derivative f(x) of 2.1");
        assert_eq!(concept.mathematical_expressions, ["f(x)"]);
        assert_eq!(concept.related_topics, ["2.1"]);

        let difficulty = data.difficulty_levels.as_ref().map(|levels| levels.overall.as_str());
        assert_eq!(difficulty, Some("Challenging"));
    }

    #[test]
    fn text_without_a_syllabus_yields_empty_data() {
        let data = SyllabusData::from_text("Just some lecture notes.");
        assert!(data.course_code.is_empty());
        assert!(data.topics.is_empty());
        assert!(data.difficulty_levels.is_none());
        assert_eq!(data.exam_format, ExamFormat::default());
    }

    struct SyllabusPages;

    impl PdfExtractor for SyllabusPages {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>> {
            if path.ends_with("broken.pdf") {
                return Err(IngestError::PdfParse("encrypted".to_string()));
            }
            Ok(vec![PageText {
                number: 1,
                text: SYLLABUS.to_string(),
            }])
        }
    }

    #[test]
    fn syllabi_are_processed_and_round_trip_through_json() -> Result<()> {
        let dir = tempdir()?;
        for name in ["h2_maths.pdf", "broken.pdf", "notes.txt"] {
            fs::write(dir.path().join(name), b"%PDF-1.4")?;
        }

        let files = syllabus_files(dir.path())?;
        assert_eq!(files.len(), 2);

        let syllabi = process_syllabi(&files, &SyllabusPages);
        assert_eq!(syllabi.len(), 1);
        let metadata = syllabi[0].metadata.as_ref().map(|metadata| metadata.file_type.as_str());
        assert_eq!(metadata, Some("pdf"));

        let out = dir.path().join("processed").join(DEFAULT_SYLLABUS_FILE);
        write_syllabus_data(&syllabi, &out)?;
        assert_eq!(read_syllabus_data(&out)?, syllabi);
        Ok(())
    }

    #[test]
    fn missing_syllabus_source_is_rejected() {
        let result = syllabus_files(Path::new("/no/such/syllabus"));
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
    }
}
