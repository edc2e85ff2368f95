pub mod batch;
pub mod chunking;
pub mod classifier;
pub mod convert;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod metadata;
pub mod models;
pub mod organize;
pub mod pairing;
pub mod prompts;
pub mod questions;
pub mod recovery;
pub mod retry;
pub mod similarity;
pub mod stores;
pub mod syllabus;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use batch::{run_batch, BatchItem, BatchReport};
pub use chunking::{
    build_content_chunks, chunk_by_paragraph, chunk_for_prompt, normalize_whitespace,
    ChunkingConfig,
};
pub use classifier::{
    classify, classify_content, classify_with_model, interpret_classification,
    ContentClassification,
};
pub use convert::{
    assign_output_names, ConversionJob, ConvertOptions, Converter, DirectorySettings, PlannedJob,
};
pub use embeddings::{
    cosine_similarity, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, Result, StoreError};
pub use extractor::{extract_page_texts, extract_text, PageText, PdfExtractor, PdfTextExtractor};
pub use graph::KnowledgeGraph;
pub use ingest::{
    discover_pdf_files, ingest_folder_chunks, ingest_folder_chunks_best_effort, read_chunks,
    write_chunks, IngestionReport, SkippedPdf,
};
pub use llm::{LanguageModel, OllamaCli, OllamaConfig};
pub use metadata::DocumentMetadata;
pub use models::{
    ContentChunk, DocumentRecord, ExtractedRecord, ExtractionMethod, IndexStats, PairingOptions,
    PairingResult, QueryMatch, Role,
};
pub use organize::{
    organize_directory, organize_directory_with_model, OrganizeOptions, OrganizeReport,
};
pub use pairing::{pair_files, pair_records};
pub use recovery::{extract_and_repair, recover_with_source, Recovered};
pub use retry::RetryPolicy;
pub use similarity::similarity;
pub use stores::QdrantStore;
pub use syllabus::{process_syllabus, SyllabusData};
pub use traits::VectorIndex;
