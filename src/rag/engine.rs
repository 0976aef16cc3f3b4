use crate::error::Result;
use crate::models::snapshot::DirectorySnapshot;
use crate::store::ObservationStore;
use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

/// One cached (snapshot id, vector, payload) triple, held in
/// chronological insertion order.
#[derive(Debug, Clone)]
pub struct CachedEmbedding {
    pub snapshot_id: i64,
    pub vector: Vec<f32>,
    pub snapshot: DirectorySnapshot,
}

/// One retrieval hit, highest similarity first.
#[derive(Debug, Clone)]
pub struct SimilarSnapshot {
    pub snapshot_id: i64,
    pub similarity: f32,
    pub snapshot: DirectorySnapshot,
}

/// In-memory nearest-neighbor cache over the store's embeddings.
///
/// The cache is rebuilt in full after every insertion and swapped in
/// atomically, so searches in flight keep reading the previous cache.
/// Full reloads are an explicit O(n) cost per scan, acceptable because
/// the table grows one row per scan interval.
pub struct RetrievalEngine {
    cache: RwLock<Arc<Vec<CachedEmbedding>>>,
}

impl RetrievalEngine {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Rebuild the cache from the store and swap it in.
    pub fn reload(&self, store: &ObservationStore) -> Result<()> {
        let rows = store.fetch_all_embeddings()?;
        let fresh: Vec<CachedEmbedding> = rows
            .into_iter()
            .map(|(snapshot_id, vector, snapshot)| CachedEmbedding {
                snapshot_id,
                vector,
                snapshot,
            })
            .collect();

        log::debug!("retrieval cache reloaded with {} embeddings", fresh.len());
        if let Ok(mut guard) = self.cache.write() {
            *guard = Arc::new(fresh);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-k entries by descending cosine similarity; similarity ties go
    /// to the most recent snapshot. An empty cache returns an empty vec.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SimilarSnapshot> {
        let cache = match self.cache.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(_) => return Vec::new(),
        };

        if cache.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut results: Vec<SimilarSnapshot> = cache
            .iter()
            .map(|entry| SimilarSnapshot {
                snapshot_id: entry.snapshot_id,
                similarity: cosine_similarity(&entry.vector, query),
                snapshot: entry.snapshot.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.snapshot_id.cmp(&a.snapshot_id))
        });
        results.truncate(k);
        results
    }
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// `dot(a, b) / (‖a‖ · ‖b‖)`. Mismatched dimensions or a zero-norm
/// vector score 0.0 rather than erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
