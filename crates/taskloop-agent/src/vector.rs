//! Vector retrieval backend and an in-process index

use async_trait::async_trait;
use std::sync::Arc;
use taskloop_core::{Result, TaskloopError};
use tokio::sync::RwLock;

use crate::types::{VectorMatch, VectorMetadata};

/// Turns text into a vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Semantic retrieval collaborator
///
/// Errors are `TaskloopError::Vector`; callers treat them as advisory.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Top `top_k` stored entries, highest score first
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Insert, or replace the entry with the same id
    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: VectorMetadata) -> Result<()>;
}

/// Cosine similarity between two vectors
///
/// Zero-length or zero-norm inputs score 0.
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

#[derive(Debug, Clone)]
struct VectorEntry {
    id: String,
    vector: Vec<f32>,
    metadata: VectorMetadata,
}

/// Cosine-similarity index held in memory for the lifetime of a run
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    dimension: Option<usize>,
    entries: RwLock<Vec<VectorEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            dimension: None,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Reject vectors whose length differs from `dimension`
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if vector.len() != expected => Err(TaskloopError::Vector(format!(
                "embedding dimension mismatch: expected {}, got {}",
                expected,
                vector.len()
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorIndex {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.embed(text).await?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        self.check_dimension(vector)?;
        let entries = self.entries.read().await;

        let mut matches: Vec<VectorMatch> = entries
            .iter()
            .map(|entry| VectorMatch {
                id: entry.id.clone(),
                task_name: entry.metadata.task.clone(),
                result_text: entry.metadata.result.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        // sort_by is stable: equal scores keep insertion order
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: VectorMetadata) -> Result<()> {
        self.check_dimension(&vector)?;
        let mut entries = self.entries.write().await;

        match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => {
                existing.vector = vector;
                existing.metadata = metadata;
            }
            None => entries.push(VectorEntry {
                id: id.to_string(),
                vector,
                metadata,
            }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds text as counts of the letters a..=d
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(['a', 'b', 'c', 'd']
                .iter()
                .map(|l| text.chars().filter(|c| c == l).count() as f32)
                .collect())
        }
    }

    fn metadata(task: &str) -> VectorMetadata {
        VectorMetadata {
            task: task.to_string(),
            result: format!("result of {}", task),
        }
    }

    fn index() -> InMemoryVectorIndex {
        InMemoryVectorIndex::new(Arc::new(LetterEmbedder))
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_ranks_by_descending_score() {
        let index = index();
        index.upsert("r1", vec![0.0, 1.0, 0.0, 0.0], metadata("far")).await.unwrap();
        index.upsert("r2", vec![1.0, 0.0, 0.0, 0.0], metadata("near")).await.unwrap();
        index.upsert("r3", vec![1.0, 1.0, 0.0, 0.0], metadata("middle")).await.unwrap();

        let query = index.embed("aaa").await.unwrap();
        let hits = index.query(&query, 5).await.unwrap();

        let names: Vec<&str> = hits.iter().map(|h| h.task_name.as_str()).collect();
        assert_eq!(names, vec!["near", "middle", "far"]);
        assert_eq!(hits[0].result_text, "result of near");
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = index();
        index.upsert("r1", vec![1.0, 0.0, 0.0, 0.0], metadata("first")).await.unwrap();
        index.upsert("r2", vec![2.0, 0.0, 0.0, 0.0], metadata("second")).await.unwrap();
        index.upsert("r3", vec![3.0, 0.0, 0.0, 0.0], metadata("third")).await.unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0, 0.0], 3).await.unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.task_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_query_truncates_to_top_k() {
        let index = index();
        for i in 0..4 {
            index
                .upsert(&format!("r{}", i), vec![1.0, i as f32, 0.0, 0.0], metadata("t"))
                .await
                .unwrap();
        }
        let hits = index.query(&[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let index = index();
        index.upsert("result_1", vec![1.0, 0.0, 0.0, 0.0], metadata("old")).await.unwrap();
        index.upsert("result_1", vec![0.0, 1.0, 0.0, 0.0], metadata("new")).await.unwrap();

        assert_eq!(index.len().await, 1);
        let hits = index.query(&[0.0, 1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].task_name, "new");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_vector_error() {
        let index = index().with_dimension(3);
        let err = index.embed("abc").await.unwrap_err();
        assert!(matches!(err, TaskloopError::Vector(_)));

        let err = index
            .upsert("x", vec![1.0, 2.0], metadata("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskloopError::Vector(_)));
        assert!(index.is_empty().await);
    }
}
