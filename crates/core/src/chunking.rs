use crate::embeddings::Embedder;
use crate::models::ContentChunk;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const DEFAULT_PROMPT_CHUNK_CHARS: usize = 3000;
const EMPTY_TEXT_PLACEHOLDER: &str = "No text content available.";

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence regex is valid"));

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 200,
            min_chars: 1,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Packs paragraphs into chunks of at most `config.max_chars`; oversized
/// chunks are cut into overlapping character windows.
pub fn chunk_by_paragraph(text: &str, config: ChunkingConfig) -> Vec<String> {
    let raw_paragraphs = text
        .split("\n\n")
        .map(normalize_whitespace)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>();

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in raw_paragraphs {
        if current.is_empty() {
            current.push_str(&paragraph);
            continue;
        }

        if current.len() + paragraph.len() + 2 <= config.max_chars {
            current.push_str("\n\n");
            current.push_str(&paragraph);
        } else {
            if current.len() >= config.min_chars {
                chunks.push(current.clone());
            }
            current.clear();
            current.push_str(&paragraph);
        }
    }

    if current.len() >= config.min_chars {
        chunks.push(current);
    }

    if chunks.is_empty() && !text.trim().is_empty() {
        chunks.push(normalize_whitespace(text));
    }

    let step = config.max_chars.saturating_sub(config.overlap_chars).max(1);
    let mut with_overlap = Vec::new();
    for chunk in chunks {
        if chunk.chars().count() <= config.max_chars {
            with_overlap.push(chunk);
            continue;
        }

        let chars: Vec<char> = chunk.chars().collect();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + config.max_chars).min(chars.len());
            let piece: String = chars[start..end].iter().collect();
            with_overlap.push(piece);
            if end == chars.len() {
                break;
            }
            start = start.saturating_add(step);
        }
    }

    with_overlap
}

/// Splits text into prompt-sized pieces along paragraph and then sentence
/// boundaries. Never returns an empty list.
pub fn chunk_for_prompt(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.trim().is_empty() {
        return vec![EMPTY_TEXT_PLACEHOLDER.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0usize;

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let pieces: Vec<&str> = if paragraph.len() > max_chars {
            split_sentences(paragraph)
        } else {
            vec![paragraph]
        };

        for piece in pieces {
            if !current.is_empty() && current_size + piece.len() + 2 > max_chars {
                chunks.push(current.join("\n\n"));
                current.clear();
                current_size = 0;
            }
            current.push(piece);
            current_size += piece.len() + 2;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }

    chunks
        .into_iter()
        .flat_map(|chunk| hard_split(chunk, max_chars))
        .collect()
}

fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_END.find_iter(paragraph) {
        let sentence = paragraph[start..boundary.start() + 1].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }
    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn hard_split(chunk: String, max_chars: usize) -> Vec<String> {
    if chunk.len() <= max_chars {
        return vec![chunk];
    }

    let chars: Vec<char> = chunk.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Chunks and embeds one document. Each chunk carries a copy of
/// `base_metadata` plus its index, the chunk total and its text under
/// `content`; ids read `<stem>_chunk_<i>`.
pub fn build_content_chunks(
    stem: &str,
    text: &str,
    base_metadata: &Map<String, Value>,
    config: ChunkingConfig,
    embedder: &dyn Embedder,
) -> Vec<ContentChunk> {
    let pieces = chunk_by_paragraph(text, config);
    let total = pieces.len();

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| {
            let mut metadata = base_metadata.clone();
            metadata.insert("chunk_index".into(), Value::from(index));
            metadata.insert("total_chunks".into(), Value::from(total));
            let values = embedder.embed(&piece);
            metadata.insert("content".into(), Value::String(piece));

            ContentChunk {
                id: format!("{stem}_chunk_{index}"),
                values,
                metadata,
            }
        })
        .collect()
}
