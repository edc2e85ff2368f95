//! Sorts a flat folder of course PDFs into pair directories and role folders.

use crate::classifier::{self, classify_content, classify_with_model};
use crate::error::{IngestError, Result};
use crate::extractor::{extract_text, PdfExtractor, PdfTextExtractor};
use crate::llm::LanguageModel;
use crate::models::{DocumentRecord, PairingOptions, Role};
use crate::pairing::pair_records;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const PAIRS_DIR: &str = "question_solution_pairs";
const CONTENT_SAMPLE_PAGES: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizeOptions {
    pub pairing: PairingOptions,
    /// Read the first pages of files whose name says nothing about their role.
    pub inspect_content: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    pub pairs: usize,
    /// Unpaired files per role.
    pub unpaired_by_role: BTreeMap<&'static str, usize>,
    pub reclassified: usize,
    pub copied: usize,
    pub failed_copies: usize,
}

/// Folder (relative to the output root) for an unpaired file of `role`.
pub fn role_folder(role: Role) -> &'static str {
    match role {
        Role::Note | Role::Unknown => "notes",
        Role::Question => "standalone_questions",
        Role::Solution => "standalone_solutions",
        Role::NoteWithQuestions => "combined_materials/notes_with_questions",
        Role::NoteWithSolutions => "combined_materials/notes_with_solutions",
        Role::Combined => "combined_materials/combined_question_solution",
    }
}

pub fn organize_directory(
    source_dir: &Path,
    output_dir: &Path,
    options: &OrganizeOptions,
) -> Result<OrganizeReport> {
    organize_directory_with(source_dir, output_dir, options, &PdfTextExtractor::default())
}

/// Pairs the PDFs directly inside `source_dir` and copies them under
/// `output_dir`. Copy failures are logged and counted.
pub fn organize_directory_with(
    source_dir: &Path,
    output_dir: &Path,
    options: &OrganizeOptions,
    extractor: &dyn PdfExtractor,
) -> Result<OrganizeReport> {
    let files = source_pdfs(source_dir)?;

    let mut reclassified = 0;
    let records = files
        .iter()
        .map(|path| {
            let record = DocumentRecord::new(path.to_string_lossy());
            if options.inspect_content && record.role == Role::Unknown {
                if let Some(role) = role_from_content(path, extractor) {
                    reclassified += 1;
                    return record.with_role(role);
                }
            }
            record
        })
        .collect();

    place_records(records, reclassified, output_dir, options)
}

/// Like [`organize_directory_with`], but files whose name gives no role are
/// classified by `model` from their first pages. `inspect_content` is implied.
pub async fn organize_directory_with_model(
    source_dir: &Path,
    output_dir: &Path,
    options: &OrganizeOptions,
    extractor: &dyn PdfExtractor,
    model: &dyn LanguageModel,
) -> Result<OrganizeReport> {
    let files = source_pdfs(source_dir)?;

    let mut reclassified = 0;
    let mut records = Vec::with_capacity(files.len());
    for path in &files {
        let record = DocumentRecord::new(path.to_string_lossy());
        if record.role != Role::Unknown {
            records.push(record);
            continue;
        }

        let text = match extract_text(extractor, path, Some(CONTENT_SAMPLE_PAGES)) {
            Ok(text) => text,
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "content inspection failed");
                records.push(record);
                continue;
            }
        };
        let classification = classify_with_model(model, &text).await;
        if classification.role == Role::Unknown {
            records.push(record);
            continue;
        }
        info!(
            path = %path.display(),
            role = %classification.role,
            confidence = classification.confidence,
            "classified by model"
        );
        reclassified += 1;
        records.push(record.with_role(classification.role));
    }

    place_records(records, reclassified, output_dir, options)
}

fn source_pdfs(source_dir: &Path) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "source is not a directory: {}",
            source_dir.display()
        )));
    }

    let files = list_pdfs(source_dir)?;
    info!(source = %source_dir.display(), files = files.len(), "organizing");
    Ok(files)
}

fn place_records(
    records: Vec<DocumentRecord>,
    reclassified: usize,
    output_dir: &Path,
    options: &OrganizeOptions,
) -> Result<OrganizeReport> {
    let result = pair_records(records, &options.pairing)?;
    let mut report = OrganizeReport {
        reclassified,
        ..OrganizeReport::default()
    };

    let pairs_root = output_dir.join(PAIRS_DIR);
    fs::create_dir_all(&pairs_root)?;

    for (number, (question, solution)) in result.pairs.iter().enumerate() {
        let pair_dir = pairs_root.join(format!(
            "{}_{}",
            sanitize(classifier::stem(&question.filename)),
            number + 1
        ));
        if let Err(error) = fs::create_dir_all(&pair_dir) {
            warn!(dir = %pair_dir.display(), reason = %error, "cannot create pair directory");
            report.failed_copies += 2;
            continue;
        }
        copy_into(&question.filename, &pair_dir, &mut report);
        copy_into(&solution.filename, &pair_dir, &mut report);
        report.pairs += 1;
    }

    for record in &result.unpaired {
        let folder = output_dir.join(role_folder(record.role));
        fs::create_dir_all(&folder)?;
        copy_into(&record.filename, &folder, &mut report);
        *report.unpaired_by_role.entry(record.role.as_str()).or_default() += 1;
    }

    info!(
        pairs = report.pairs,
        unpaired = result.unpaired.len(),
        copied = report.copied,
        failed = report.failed_copies,
        "organizing finished"
    );
    Ok(report)
}

fn list_pdfs(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(source_dir)?
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

fn role_from_content(path: &Path, extractor: &dyn PdfExtractor) -> Option<Role> {
    match extract_text(extractor, path, Some(CONTENT_SAMPLE_PAGES)) {
        Ok(text) => {
            let role = classify_content(&text);
            debug!(path = %path.display(), %role, "classified from content");
            (role != Role::Unknown).then_some(role)
        }
        Err(error) => {
            warn!(path = %path.display(), reason = %error, "content inspection failed");
            None
        }
    }
}

fn copy_into(source: &str, dir: &Path, report: &mut OrganizeReport) {
    let name = classifier::base_name(source);
    let target = dir.join(name);
    match fs::copy(source, &target) {
        Ok(_) => report.copied += 1,
        Err(error) => {
            warn!(file = source, target = %target.display(), reason = %error, "copy failed");
            report.failed_copies += 1;
        }
    }
}

fn sanitize(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "pair".to_string()
    } else {
        cleaned
    }
}
