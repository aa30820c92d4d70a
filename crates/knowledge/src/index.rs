//! Flat nearest-neighbor vector index.
//!
//! An exhaustive index over squared Euclidean distance: every query
//! scans every stored vector. Deletion is not supported in place — flat
//! storage has no holes — so callers rebuild from the surviving vectors.
//! The index serializes to an exact binary form (header plus raw
//! little-endian f32 data) for embedding into the snapshot file.

use loreweaver_core::{AppError, AppResult};

/// File magic for serialized indexes.
const INDEX_MAGIC: &[u8; 4] = b"LWIX";

/// Serialization format version.
const INDEX_VERSION: u32 = 1;

/// Header: magic + version + dimension + count, each field 4 bytes.
const HEADER_LEN: usize = 16;

/// Flat (exhaustive) vector index with a fixed declared dimension.
///
/// Vectors are stored contiguously in insertion order; a vector's
/// position doubles as its identifier. The index never holds vectors of
/// mixed dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index declared for `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Declared vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            return 0;
        }
        self.data.len() / self.dimension
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors in order.
    ///
    /// Every vector is validated against the declared dimension before
    /// anything is stored, so a failed call leaves the index unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> AppResult<()> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(AppError::Knowledge(format!(
                    "Vector has {} dimensions, index is declared for {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }

        for vector in vectors {
            self.data.extend_from_slice(vector);
        }

        Ok(())
    }

    /// Return up to `k` stored positions ordered by ascending squared
    /// Euclidean distance to `query`; ties break toward the lower
    /// (earlier-inserted) position. Fewer than `k` results when fewer
    /// vectors are stored; empty on an empty index.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(AppError::Knowledge(format!(
                "Query has {} dimensions, index is declared for {}",
                query.len(),
                self.dimension
            )));
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| (position, squared_distance(query, stored)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Serialize to the exact binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Deserialize from the binary form, preserving exact vector
    /// contents and the declared dimension.
    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AppError::Serialization(
                "Index data shorter than header".to_string(),
            ));
        }

        if &bytes[0..4] != INDEX_MAGIC {
            return Err(AppError::Serialization("Bad index magic".to_string()));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != INDEX_VERSION {
            return Err(AppError::Serialization(format!(
                "Unsupported index version: {}",
                version
            )));
        }

        let dimension = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let count = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;

        let payload = &bytes[HEADER_LEN..];
        let expected_len = dimension
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| AppError::Serialization("Index size overflow".to_string()))?;

        if payload.len() != expected_len {
            return Err(AppError::Serialization(format!(
                "Index payload is {} bytes, expected {}",
                payload.len(),
                expected_len
            )));
        }

        let mut data = Vec::with_capacity(dimension * count);
        for chunk in payload.chunks_exact(4) {
            data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        Ok(Self { dimension, data })
    }
}

/// Squared Euclidean distance; the square root is monotonic and
/// irrelevant for ranking, and squared distances match what flat L2
/// indexes conventionally report.
fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatIndex {
        let mut index = FlatIndex::new(2);
        index
            .add(&[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 2.0],
                vec![3.0, 3.0],
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_empty_index_search() {
        let index = FlatIndex::new(3);
        let hits = index.search(&[0.0, 0.0, 0.0], 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0], 4).unwrap();

        let positions: Vec<usize> = hits.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);

        let distances: Vec<f32> = hits.iter().map(|(_, d)| *d).collect();
        assert_eq!(distances, vec![0.0, 1.0, 4.0, 18.0]);
    }

    #[test]
    fn test_search_tie_breaks_by_insertion_order() {
        let mut index = FlatIndex::new(1);
        index
            .add(&[vec![1.0], vec![-1.0], vec![1.0]])
            .unwrap();

        // Positions 0, 1 and 2 are all at squared distance 1 from zero;
        // lower positions must win.
        let hits = index.search(&[0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_search_truncates_to_k() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_search_returns_fewer_than_k() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(2);
        let result = index.add(&[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]]);
        assert!(result.is_err());
        // The failed call must not have stored the valid prefix.
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_search_rejects_wrong_dimension() {
        let index = sample_index();
        assert!(index.search(&[0.0], 1).is_err());
    }

    #[test]
    fn test_binary_round_trip() {
        let index = sample_index();
        let bytes = index.to_bytes();
        let restored = FlatIndex::from_bytes(&bytes).unwrap();

        assert_eq!(restored, index);
        assert_eq!(restored.dimension(), 2);
        assert_eq!(restored.len(), 4);
    }

    #[test]
    fn test_empty_round_trip() {
        let index = FlatIndex::new(7);
        let restored = FlatIndex::from_bytes(&index.to_bytes()).unwrap();
        assert_eq!(restored.dimension(), 7);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(FlatIndex::from_bytes(b"short").is_err());
        assert!(FlatIndex::from_bytes(&[0u8; 16]).is_err());

        // Valid header but truncated payload.
        let mut bytes = sample_index().to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(FlatIndex::from_bytes(&bytes).is_err());
    }
}
