use crate::chunking::normalize_whitespace;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Text encoder producing fixed-length vectors.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Hashes lowercase character trigrams into buckets and L2-normalises the
/// counts. Deterministic and dependency-free, so indexing and search agree
/// without a model download.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let chars: Vec<char> = normalize_whitespace(text).to_lowercase().chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let bucket = (fnv1a(window) % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

fn fnv1a(window: &[char]) -> u64 {
    let mut hash = 1469598103934665603u64;
    let mut buffer = [0u8; 4];
    for ch in window {
        for byte in ch.encode_utf8(&mut buffer).bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
    }
    hash
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm = left.iter().map(|v| v * v).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|v| v * v).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Integration by parts");
        let second = embedder.embed("Integration  by\nparts");
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_EMBEDDING_DIMENSIONS);
    }

    #[test]
    fn related_text_scores_higher() {
        let embedder = CharacterNgramEmbedder { dimensions: 256 };
        let query = embedder.embed("differentiation of polynomials");
        let close = embedder.embed("differentiate a polynomial term by term");
        let far = embedder.embed("the mitochondria is the powerhouse");

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = CharacterNgramEmbedder { dimensions: 8 };
        let batch = embedder.embed_batch(&["", "ab"]);
        assert!(batch.iter().all(|vector| vector.iter().all(|v| *v == 0.0)));
        assert_eq!(cosine_similarity(&batch[0], &batch[1]), 0.0);
    }
}
