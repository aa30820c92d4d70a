//! Deterministic trigram-hash encoder.
//!
//! The offline and development backend: maps text to a fixed-dimension
//! unit vector by hashing words and character trigrams into buckets.
//! Not semantically accurate like a neural encoder, but deterministic,
//! content-dependent and dependency-free, which also makes it the
//! degraded mode when neither a remote credential nor local model files
//! are available. Retrieval over these vectors is still genuine
//! nearest-neighbor search, never substring matching.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Weight applied to character-trigram buckets relative to word buckets.
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Trigram-hash embedding encoder with a configurable dimension.
#[derive(Debug, Clone)]
pub struct TrigramEncoder {
    dimension: usize,
    // Shared across clones so diagnostics see every encode call.
    encode_calls: Arc<AtomicUsize>,
}

impl TrigramEncoder {
    /// Create a new encoder producing vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            encode_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Declared embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of `encode` calls observed so far (diagnostics).
    pub fn encode_count(&self) -> usize {
        self.encode_calls.load(Ordering::Relaxed)
    }

    /// Encode a batch of texts. Deterministic: identical input always
    /// yields identical vectors.
    pub fn encode(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.encode_calls.fetch_add(1, Ordering::Relaxed);
        texts.iter().map(|text| self.embed_text(text)).collect()
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        // A zero-dimension encoder has no buckets to hash into; the
        // remainder below would otherwise divide by zero.
        if self.dimension == 0 {
            return Vec::new();
        }

        let mut vector = vec![0.0f32; self.dimension];

        for word in text.to_lowercase().split_whitespace() {
            let bucket = (fnv1a(word.as_bytes()) as usize) % self.dimension;
            vector[bucket] += 1.0;

            // Character trigrams capture sub-word overlap; they also make
            // the encoder useful for scripts without word boundaries.
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let bucket = (fnv1a(trigram.as_bytes()) as usize) % self.dimension;
                vector[bucket] += TRIGRAM_WEIGHT;
            }
        }

        normalize(&mut vector);
        vector
    }
}

/// FNV-1a over bytes; stable across platforms and releases, which keeps
/// stored embeddings comparable to freshly computed ones.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Scale to a unit vector; zero vectors (empty text) stay zero.
fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_and_shape() {
        let encoder = TrigramEncoder::new(128);
        let vectors = encoder.encode(&["a dragon guards the gate".to_string()]);

        assert_eq!(encoder.dimension(), 128);
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 128);
    }

    #[test]
    fn test_deterministic() {
        let encoder = TrigramEncoder::new(64);
        let a = encoder.encode(&["Elena wields fire magic".to_string()]);
        let b = encoder.encode(&["Elena wields fire magic".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_texts_differ() {
        let encoder = TrigramEncoder::new(64);
        let a = encoder.encode(&["fire magic".to_string()]);
        let b = encoder.encode(&["ice magic".to_string()]);
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn test_unit_norm() {
        let encoder = TrigramEncoder::new(64);
        let vectors = encoder.encode(&["the old keep stands on the hill".to_string()]);
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let encoder = TrigramEncoder::new(64);
        let vectors = encoder.encode(&[String::new()]);
        assert!(vectors[0].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_cjk_text() {
        let encoder = TrigramEncoder::new(64);
        let vectors = encoder.encode(&["熊心突破了凝气境界".to_string()]);
        assert_eq!(vectors[0].len(), 64);
        assert!(vectors[0].iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_zero_dimension_encodes_without_panicking() {
        let encoder = TrigramEncoder::new(0);
        let vectors = encoder.encode(&["fire magic".to_string()]);
        assert_eq!(vectors.len(), 1);
        assert!(vectors[0].is_empty());
    }

    #[test]
    fn test_encode_counter() {
        let encoder = TrigramEncoder::new(32);
        assert_eq!(encoder.encode_count(), 0);

        encoder.encode(&["one".to_string()]);
        encoder.encode(&["two".to_string()]);
        assert_eq!(encoder.encode_count(), 2);

        // Clones share the counter.
        let clone = encoder.clone();
        clone.encode(&["three".to_string()]);
        assert_eq!(encoder.encode_count(), 3);
    }
}
