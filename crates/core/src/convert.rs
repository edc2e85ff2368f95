//! PDF to structured study record conversion.

use crate::batch::{run_batch, BatchItem, BatchReport};
use crate::chunking::{chunk_for_prompt, DEFAULT_PROMPT_CHUNK_CHARS};
use crate::classifier::{self, classify};
use crate::error::{IngestError, Result};
use crate::extractor::{extract_text, PdfExtractor, PdfTextExtractor};
use crate::ingest::discover_pdf_files;
use crate::llm::LanguageModel;
use crate::metadata::DocumentMetadata;
use crate::models::{ExtractedRecord, ExtractionMethod, PairingOptions, RecordContent};
use crate::pairing::pair_files;
use crate::prompts::{
    concept_relationship_prompt, notes_prompt, pair_prompt, question_generation_prompt,
    syllabus_mapping_prompt,
};
use crate::questions::match_questions_to_solutions;
use crate::recovery::{
    extract_and_repair, fallback_scrape, parse_lenient, recover_with_source, Recovered,
};
use crate::retry::RetryPolicy;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type SharedExtractor = Arc<dyn PdfExtractor + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub prompt_chunk_chars: usize,
    /// Caller-supplied JSON schema, sent to the model in place of the
    /// built-in record skeleton.
    pub schema_hint: Option<String>,
    pub syllabus_text: Option<String>,
    pub generate_questions: bool,
    pub analyze_relationships: bool,
    pub retry: RetryPolicy,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            prompt_chunk_chars: DEFAULT_PROMPT_CHUNK_CHARS,
            schema_hint: None,
            syllabus_text: None,
            generate_questions: false,
            analyze_relationships: false,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct Converter {
    model: Arc<dyn LanguageModel>,
    extractor: SharedExtractor,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(model: Arc<dyn LanguageModel>, options: ConvertOptions) -> Self {
        Self {
            model,
            extractor: Arc::new(PdfTextExtractor::default()),
            options,
        }
    }

    pub fn with_extractor(mut self, extractor: SharedExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    async fn read_text(&self, path: &Path) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_text(extractor.as_ref(), &owned, None))
            .await
            .map_err(|error| IngestError::PdfParse(format!("extraction task failed: {error}")))?
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let model = &self.model;
        self.options
            .retry
            .run("model completion", move || model.complete(prompt))
            .await
    }

    /// Converts one document. Model failures degrade to text scraping and an
    /// unreadable PDF yields a record describing the failure, so only local
    /// I/O errors surface as `Err`.
    pub async fn convert_pdf(&self, path: &Path) -> Result<ExtractedRecord> {
        let text = match self.read_text(path).await {
            Ok(text) => text,
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "text extraction failed");
                return Ok(extraction_failure(path, &error));
            }
        };

        let metadata = DocumentMetadata::from_file(path, &text)?.to_map();
        let chunks = chunk_for_prompt(&text, self.options.prompt_chunk_chars);
        let total = chunks.len();

        let mut records = Vec::with_capacity(total);
        for (index, chunk) in chunks.iter().enumerate() {
            info!(path = %path.display(), chunk = index + 1, total, "structuring chunk");
            let prompt = notes_prompt(chunk, &metadata, self.options.schema_hint.as_deref());
            let record = match self.complete(&prompt).await {
                Ok(raw) => into_record(recover_with_source(&raw, chunk)),
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        chunk = index + 1,
                        reason = %error,
                        "model failed; scraping chunk text"
                    );
                    into_record(Recovered {
                        value: fallback_scrape(chunk),
                        method: ExtractionMethod::Fallback,
                    })
                }
            };
            records.push(record);
        }

        let mut record = merge_records(records);
        record.merge_metadata(&metadata);
        self.enrich(&mut record, &text).await;
        Ok(record)
    }

    async fn enrich(&self, record: &mut ExtractedRecord, text: &str) {
        if let Some(syllabus) = self.options.syllabus_text.as_deref() {
            let prompt = syllabus_mapping_prompt(text, syllabus, &record.metadata);
            if let Some(mapping) = self.enrichment("syllabus mapping", &prompt).await {
                record.syllabus_mapping = Some(mapping);
            }
        }

        if record.content.key_concepts.is_empty() {
            return;
        }

        if self.options.analyze_relationships {
            let prompt = concept_relationship_prompt(record, self.options.syllabus_text.as_deref());
            match self.enrichment("concept relationships", &prompt).await {
                Some(Value::Object(analysis)) => {
                    record.relationships.get_or_insert_with(Map::new).extend(analysis);
                }
                Some(_) | None => {}
            }
        }

        if self.options.generate_questions {
            let prompt = question_generation_prompt(record);
            let generated = self
                .enrichment("question generation", &prompt)
                .await
                .and_then(|mut value| value.get_mut("generated_questions").map(Value::take));

            match generated {
                Some(Value::Array(questions)) => {
                    debug!(count = questions.len(), "appending generated questions");
                    for mut question in questions {
                        if let Value::Object(fields) = &mut question {
                            fields.insert("generated".into(), Value::Bool(true));
                        }
                        record.content.practice_questions.push(question);
                    }
                }
                _ => warn!("question generation returned no question list; skipping"),
            }
        }
    }

    async fn enrichment(&self, label: &str, prompt: &str) -> Option<Value> {
        match self.complete(prompt).await {
            Ok(raw) => {
                let parsed = parse_lenient(&raw);
                if parsed.is_none() {
                    warn!(enrichment = label, "enrichment output unparseable; skipping");
                }
                parsed
            }
            Err(error) => {
                warn!(enrichment = label, reason = %error, "enrichment failed; skipping");
                None
            }
        }
    }

    /// Converts a question paper together with its solutions. When the model
    /// output cannot be structured, questions are matched to solutions by
    /// numbering and shared vocabulary instead.
    pub async fn convert_pair(&self, question: &Path, solution: &Path) -> Result<ExtractedRecord> {
        let question_text = self.read_text(question).await?;
        let solution_text = self.read_text(solution).await?;

        let mut metadata = DocumentMetadata::from_file(question, &question_text)?.to_map();
        metadata.insert("document_type".into(), Value::from("question_solution_pair"));
        metadata.insert("question_file".into(), Value::from(file_name(question)));
        metadata.insert("solution_file".into(), Value::from(file_name(solution)));

        let prompt = pair_prompt(&question_text, &solution_text, &metadata);
        let recovered = match self.complete(&prompt).await {
            Ok(raw) => Some(extract_and_repair(&raw)).filter(|recovered| !recovered.is_fallback()),
            Err(error) => {
                warn!(question = %question.display(), reason = %error, "model failed on pair");
                None
            }
        };

        let mut record = match recovered {
            Some(recovered) => into_record(recovered),
            None => {
                info!(question = %question.display(), "building structured pair record");
                ExtractedRecord {
                    content: RecordContent {
                        summary: format!(
                            "Combined document containing questions from {} and solutions from {}",
                            file_name(question),
                            file_name(solution)
                        ),
                        practice_questions: match_questions_to_solutions(
                            &question_text,
                            &solution_text,
                        ),
                        ..RecordContent::default()
                    },
                    extraction_method: Some(ExtractionMethod::StructuredFallback),
                    ..ExtractedRecord::default()
                }
            }
        };
        record.merge_metadata(&metadata);
        Ok(record)
    }

    /// Runs one job and writes its record under `output_dir`.
    pub async fn run_job(&self, planned: PlannedJob, output_dir: &Path) -> Result<PathBuf> {
        let record = match &planned.job {
            ConversionJob::Pair { question, solution }
            | ConversionJob::PairDirectory {
                question, solution, ..
            } => self.convert_pair(question, solution).await?,
            ConversionJob::Single(path) => self.convert_pdf(path).await?,
        };

        let output = output_dir.join(&planned.output_name);
        write_record(&record, &output).await?;
        Ok(output)
    }

    /// Discovers every PDF under `source_dir`, pairs them and converts pairs
    /// and leftovers with at most `settings.workers` jobs in flight.
    pub async fn convert_directory(
        &self,
        source_dir: &Path,
        output_dir: &Path,
        settings: &DirectorySettings,
    ) -> Result<BatchReport> {
        if !source_dir.is_dir() {
            return Err(IngestError::InvalidArgument(format!(
                "source is not a directory: {}",
                source_dir.display()
            )));
        }

        let pdfs = discover_pdf_files(source_dir);
        let jobs = assign_output_names(plan_jobs(&pdfs, &settings.pairing, settings.max_jobs)?);
        info!(
            pdfs = pdfs.len(),
            jobs = jobs.len(),
            workers = settings.workers,
            "starting conversion"
        );

        tokio::fs::create_dir_all(output_dir).await?;
        run_batch(jobs, settings.workers, move |job| self.run_job(job, output_dir)).await
    }

    /// Converts every pre-organised pair directory directly under `pairs_dir`.
    pub async fn convert_pair_directories(
        &self,
        pairs_dir: &Path,
        output_dir: &Path,
        workers: usize,
        max_pairs: Option<usize>,
    ) -> Result<BatchReport> {
        let mut jobs = plan_pair_directories(pairs_dir)?;
        if let Some(limit) = max_pairs {
            jobs.truncate(limit);
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let jobs = assign_output_names(jobs);
        run_batch(jobs, workers, move |job| self.run_job(job, output_dir)).await
    }
}

#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub pairing: PairingOptions,
    pub workers: usize,
    pub max_jobs: Option<usize>,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            pairing: PairingOptions::default(),
            workers: 1,
            max_jobs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionJob {
    Pair { question: PathBuf, solution: PathBuf },
    /// A pair already organised into its own directory.
    PairDirectory {
        dir: PathBuf,
        question: PathBuf,
        solution: PathBuf,
    },
    Single(PathBuf),
}

impl ConversionJob {
    /// Output name before any collision suffix.
    pub fn output_file_name(&self) -> String {
        match self {
            ConversionJob::Pair { question, .. } => {
                format!("{}_combined.json", file_stem(question))
            }
            ConversionJob::PairDirectory { dir, .. } => format!("{}.json", file_name(dir)),
            ConversionJob::Single(path) => format!("{}_enhanced.json", file_stem(path)),
        }
    }
}

/// A job and the file name its record is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedJob {
    pub job: ConversionJob,
    pub output_name: String,
}

impl BatchItem for PlannedJob {
    fn label(&self) -> PathBuf {
        self.job.label()
    }
}

/// Gives every job a distinct output name. A name already used by an earlier
/// job gets `_2`, `_3` and so on before its extension.
pub fn assign_output_names(jobs: Vec<ConversionJob>) -> Vec<PlannedJob> {
    let mut taken = HashSet::new();
    jobs.into_iter()
        .map(|job| {
            let base = job.output_file_name();
            let stem = base.strip_suffix(".json").unwrap_or(&base).to_string();
            let mut output_name = base.clone();
            let mut copy = 2;
            while !taken.insert(output_name.clone()) {
                output_name = format!("{stem}_{copy}.json");
                copy += 1;
            }
            if output_name != base {
                warn!(
                    item = %job.label().display(),
                    output = %output_name,
                    "output name already used, writing under a suffixed name"
                );
            }
            PlannedJob { job, output_name }
        })
        .collect()
}

impl BatchItem for ConversionJob {
    fn label(&self) -> PathBuf {
        match self {
            ConversionJob::Pair { question, .. } => question.clone(),
            ConversionJob::PairDirectory { dir, .. } => dir.clone(),
            ConversionJob::Single(path) => path.clone(),
        }
    }
}

/// Pairs first, then leftovers, each in pairing order, cut to `max_jobs`.
pub fn plan_jobs(
    pdfs: &[PathBuf],
    pairing: &PairingOptions,
    max_jobs: Option<usize>,
) -> Result<Vec<ConversionJob>> {
    let names: Vec<String> = pdfs.iter().map(|path| path.to_string_lossy().to_string()).collect();
    let result = pair_files(&names, pairing)?;

    let mut jobs: Vec<ConversionJob> = result
        .pairs
        .into_iter()
        .map(|(question, solution)| ConversionJob::Pair {
            question: PathBuf::from(question.filename),
            solution: PathBuf::from(solution.filename),
        })
        .chain(
            result
                .unpaired
                .into_iter()
                .map(|record| ConversionJob::Single(PathBuf::from(record.filename))),
        )
        .collect();

    if let Some(limit) = max_jobs {
        jobs.truncate(limit);
    }
    Ok(jobs)
}

/// One job per subdirectory of `pairs_dir` that holds a recognisable
/// question and solution; other subdirectories are logged and skipped.
pub fn plan_pair_directories(pairs_dir: &Path) -> Result<Vec<ConversionJob>> {
    if !pairs_dir.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "pairs directory not found: {}",
            pairs_dir.display()
        )));
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(pairs_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut jobs = Vec::new();
    for dir in dirs {
        match identify_pair_files(&dir)? {
            Some((question, solution)) => jobs.push(ConversionJob::PairDirectory {
                dir,
                question,
                solution,
            }),
            None => warn!(dir = %dir.display(), "no question/solution files found; skipping"),
        }
    }
    Ok(jobs)
}

/// Solution-like names go to the solution side. When names don't split the
/// files, the shorter of two names is taken as the question.
fn identify_pair_files(dir: &Path) -> Result<Option<(PathBuf, PathBuf)>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_pdf(path))
        .collect();
    files.sort();

    let (solutions, questions): (Vec<&PathBuf>, Vec<&PathBuf>) = files
        .iter()
        .partition(|path| classify(&file_name(path)).is_solution_like());

    if let (Some(question), Some(solution)) = (questions.first(), solutions.first()) {
        return Ok(Some(((*question).clone(), (*solution).clone())));
    }

    Ok(match files.as_slice() {
        [first, second] if file_name(first).len() <= file_name(second).len() => {
            Some((first.clone(), second.clone()))
        }
        [first, second] => Some((second.clone(), first.clone())),
        [first, second, ..] => Some((first.clone(), second.clone())),
        _ => None,
    })
}

/// Writes `record` as pretty JSON, creating parent directories.
pub async fn write_record(record: &ExtractedRecord, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Folds per-chunk records into one: summaries joined, lists appended,
/// related topics deduplicated, relationship lists merged per key, and the
/// most degraded extraction method kept.
pub fn merge_records(records: Vec<ExtractedRecord>) -> ExtractedRecord {
    let mut merged = ExtractedRecord::default();
    let mut summaries = Vec::new();

    for record in records {
        for (key, value) in record.metadata {
            merged.metadata.entry(key).or_insert(value);
        }

        let content = record.content;
        if !content.summary.trim().is_empty() {
            summaries.push(content.summary.trim().to_string());
        }
        merged.content.key_concepts.extend(content.key_concepts);
        merged.content.practice_questions.extend(content.practice_questions);
        merge_map(&mut merged.content.extra, content.extra);

        for topic in record.related_topics {
            if !merged.related_topics.contains(&topic) {
                merged.related_topics.push(topic);
            }
        }

        if let Some(relationships) = record.relationships {
            merge_map(merged.relationships.get_or_insert_with(Map::new), relationships);
        }

        if merged.syllabus_mapping.is_none() {
            merged.syllabus_mapping = record.syllabus_mapping;
        }
        merged.extraction_method = merged.extraction_method.max(record.extraction_method);
    }

    merged.content.summary = summaries.join(" ");
    merged
}

fn merge_map(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(items)) => {
                for item in items {
                    if !existing.contains(&item) {
                        existing.push(item);
                    }
                }
            }
            (Some(_), _) => {}
            (None, value) => {
                target.insert(key, value);
            }
        }
    }
}

fn into_record(recovered: Recovered) -> ExtractedRecord {
    let mut record = ExtractedRecord::from_value(recovered.value);
    if recovered.method != ExtractionMethod::Model {
        record.extraction_method = Some(recovered.method);
    }
    record
}

fn extraction_failure(path: &Path, error: &IngestError) -> ExtractedRecord {
    let mut metadata = Map::new();
    metadata.insert("filename".into(), Value::from(file_name(path)));
    metadata.insert("file_path".into(), Value::from(path.to_string_lossy().to_string()));
    metadata.insert("extraction_error".into(), Value::from(error.to_string()));

    ExtractedRecord {
        metadata,
        content: RecordContent {
            summary: format!("Failed to extract text from PDF: {error}"),
            ..RecordContent::default()
        },
        ..ExtractedRecord::default()
    }
}

fn is_pdf(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn file_name(path: &Path) -> String {
    classifier::base_name(&path.to_string_lossy()).to_string()
}

fn file_stem(path: &Path) -> String {
    classifier::stem(&path.to_string_lossy()).to_string()
}
