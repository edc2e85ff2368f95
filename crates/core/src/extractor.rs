use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Shells out to poppler's `pdftotext`, which copes with many files lopdf
/// cannot decode.
#[derive(Debug, Clone)]
pub struct PdftotextExtractor {
    pub program: String,
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self {
            program: "pdftotext".to_string(),
        }
    }
}

impl PdfExtractor for PdftotextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let output = Command::new(&self.program)
            .arg(path)
            .arg("-")
            .output()
            .map_err(|error| {
                IngestError::PdfParse(format!("{} unavailable: {error}", self.program))
            })?;

        if !output.status.success() {
            return Err(IngestError::PdfParse(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pages = split_form_feed_pages(&String::from_utf8_lossy(&output.stdout));
        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "{} produced no text for {}",
                self.program,
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// lopdf first, `pdftotext` when lopdf fails or finds no text.
#[derive(Default)]
pub struct PdfTextExtractor {
    pub primary: LopdfExtractor,
    pub fallback: PdftotextExtractor,
}

impl PdfExtractor for PdfTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        match self.primary.extract_pages(path) {
            Ok(pages) => Ok(pages),
            Err(IngestError::PdfParse(parse_error)) => {
                debug!(
                    path = %path.display(),
                    reason = %parse_error,
                    "lopdf failed; trying pdftotext"
                );
                self.fallback.extract_pages(path).map_err(|fallback_error| {
                    IngestError::PdfParse(format!(
                        "{parse_error}; pdftotext fallback failed: {fallback_error}"
                    ))
                })
            }
            Err(error) => Err(error),
        }
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    PdfTextExtractor::default().extract_pages(path)
}

/// Page texts joined by blank lines, optionally limited to the first
/// `max_pages` pages.
pub fn extract_text(
    extractor: &dyn PdfExtractor,
    path: &Path,
    max_pages: Option<usize>,
) -> Result<String, IngestError> {
    let pages = extractor.extract_pages(path)?;
    let limit = max_pages.unwrap_or(pages.len());

    Ok(pages
        .iter()
        .take(limit)
        .map(|page| page.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

fn split_form_feed_pages(raw_text: &str) -> Vec<PageText> {
    raw_text
        .split('\u{000c}')
        .enumerate()
        .filter_map(|(index, chunk)| {
            let normalized = chunk.trim().to_string();
            if normalized.is_empty() {
                None
            } else {
                Some(PageText {
                    number: (index + 1) as u32,
                    text: normalized,
                })
            }
        })
        .collect()
}
