use crate::chunking::{build_content_chunks, ChunkingConfig};
use crate::classifier;
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::{extract_text, PdfExtractor, PdfTextExtractor};
use crate::metadata::DocumentMetadata;
use crate::models::ContentChunk;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn ingest_folder_chunks(
    folder: &Path,
    config: ChunkingConfig,
    embedder: &dyn Embedder,
) -> Result<Vec<ContentChunk>, IngestError> {
    let report = ingest_folder_chunks_best_effort(folder, config, embedder)?;
    Ok(report.chunks)
}

#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct IngestionReport {
    pub chunks: Vec<ContentChunk>,
    pub documents: usize,
    pub skipped_files: Vec<SkippedPdf>,
}

pub fn ingest_folder_chunks_best_effort(
    folder: &Path,
    config: ChunkingConfig,
    embedder: &dyn Embedder,
) -> Result<IngestionReport, IngestError> {
    ingest_folder_with(folder, config, embedder, &PdfTextExtractor::default())
}

/// Chunks and embeds every PDF under `folder`. Files that fail are recorded
/// in `skipped_files`; only an empty folder is an error.
pub fn ingest_folder_with(
    folder: &Path,
    config: ChunkingConfig,
    embedder: &dyn Embedder,
    extractor: &dyn PdfExtractor,
) -> Result<IngestionReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut result = Vec::new();
    let mut documents = 0;
    let mut skipped_files = Vec::new();

    for path in files {
        match chunk_document(&path, config, embedder, extractor) {
            Ok(file_chunks) => {
                info!(path = %path.display(), chunks = file_chunks.len(), "chunked document");
                documents += 1;
                result.extend(file_chunks);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipping document");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(IngestionReport {
        chunks: result,
        documents,
        skipped_files,
    })
}

fn chunk_document(
    path: &Path,
    config: ChunkingConfig,
    embedder: &dyn Embedder,
    extractor: &dyn PdfExtractor,
) -> Result<Vec<ContentChunk>, IngestError> {
    let text = extract_text(extractor, path, None)?;
    let display = path.to_string_lossy();
    let stem = classifier::stem(&display);
    if stem.is_empty() {
        return Err(IngestError::MissingFileName(display.to_string()));
    }

    let mut metadata = DocumentMetadata::from_file(path, &text)?.to_map();
    metadata.insert("source".into(), Value::from(classifier::base_name(&display)));
    metadata.insert("content_hash".into(), Value::from(digest_file(path)?));

    Ok(build_content_chunks(stem, &text, &metadata, config, embedder))
}

pub fn write_chunks(chunks: &[ContentChunk], path: &Path) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(chunks)?)?;
    Ok(())
}

pub fn read_chunks(path: &Path) -> Result<Vec<ContentChunk>, IngestError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extractor::PageText;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    struct OnePage(&'static str);

    impl PdfExtractor for OnePage {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<PageText>, IngestError> {
            Ok(vec![PageText {
                number: 1,
                text: self.0.to_string(),
            }])
        }
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("c.txt"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn ingestion_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();
        let result =
            ingest_folder_chunks_best_effort(dir.path(), ChunkingConfig::default(), &embedder);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn best_effort_skips_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let report =
            ingest_folder_chunks_best_effort(dir.path(), ChunkingConfig::default(), &embedder)?;

        assert_eq!(report.chunks.len(), 0);
        assert_eq!(report.documents, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[test]
    fn chunks_carry_document_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("Trigonometry Notes.pdf"), b"%PDF-1.4")?;
        let embedder = CharacterNgramEmbedder::default();

        let report = ingest_folder_with(
            dir.path(),
            ChunkingConfig::default(),
            &embedder,
            &OnePage("Chapter 3: Identities\n\nsin^2 x + cos^2 x = 1."),
        )?;

        assert_eq!(report.documents, 1);
        let chunk = &report.chunks[0];
        assert_eq!(chunk.id, "Trigonometry Notes_chunk_0");
        assert_eq!(chunk.metadata["source"], "Trigonometry Notes.pdf");
        assert_eq!(chunk.metadata["topic"], "Identities");
        assert_eq!(chunk.metadata["topics"], serde_json::json!(["trigonometry"]));
        assert_eq!(
            chunk.metadata["content_hash"],
            digest_file(&dir.path().join("Trigonometry Notes.pdf"))?
        );
        assert!(chunk.text().contains("cos^2 x"));
        assert_eq!(chunk.values.len(), embedder.dimensions());
        Ok(())
    }

    #[test]
    fn chunk_files_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("out").join("content_chunks.json");
        let chunks = vec![ContentChunk {
            id: "a_chunk_0".to_string(),
            values: vec![0.25, 0.75],
            metadata: serde_json::Map::new(),
        }];

        write_chunks(&chunks, &path)?;
        assert_eq!(read_chunks(&path)?, chunks);
        Ok(())
    }
}
