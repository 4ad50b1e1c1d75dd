//! Context supplied to Execute and StopCheck prompts
//!
//! Two strategies:
//! - Raw: names of all queued tasks, in queue order
//! - Semantic: task names of the stored results most similar to the
//!   objective, highest score first
//!
//! Context is advisory. Any semantic failure falls back to raw.

use std::sync::Arc;

use taskloop_agent::{VectorBackend, VectorMetadata};
use taskloop_core::fail_open::fail_open;
use taskloop_core::{Result, SharedState, Task};
use tracing::debug;

/// Which strategy a provider uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStrategy {
    Raw,
    Semantic,
}

struct SemanticSource {
    backend: Arc<dyn VectorBackend>,
    top_k: usize,
}

impl SemanticSource {
    async fn retrieve(&self, objective: &str) -> Result<Vec<String>> {
        let query = self.backend.embed(objective).await?;
        let mut matches = self.backend.query(&query, self.top_k).await?;
        // Stable: ties keep the backend's order
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.top_k);
        Ok(matches.into_iter().map(|m| m.task_name).collect())
    }

    async fn record(&self, task: &Task, result: &str) -> Result<()> {
        let vector = self.backend.embed(&result.replace('\n', " ")).await?;
        let metadata = VectorMetadata {
            task: task.name.clone(),
            result: result.to_string(),
        };
        self.backend
            .upsert(&result_id(task), vector, metadata)
            .await
    }
}

/// Vector index id for a task's result
pub fn result_id(task: &Task) -> String {
    format!("result_{}", task.id)
}

/// Supplies context lines for prompts
pub struct ContextProvider {
    semantic: Option<SemanticSource>,
}

impl ContextProvider {
    pub fn raw() -> Self {
        Self { semantic: None }
    }

    pub fn semantic(backend: Arc<dyn VectorBackend>, top_k: usize) -> Self {
        Self {
            semantic: Some(SemanticSource { backend, top_k }),
        }
    }

    pub fn strategy(&self) -> ContextStrategy {
        if self.semantic.is_some() {
            ContextStrategy::Semantic
        } else {
            ContextStrategy::Raw
        }
    }

    pub async fn get_context(&self, state: &SharedState) -> Vec<String> {
        if let Some(source) = &self.semantic {
            if let Some(context) =
                fail_open("semantic_context", || source.retrieve(&state.objective)).await
            {
                debug!(entries = context.len(), "Retrieved semantic context");
                return context;
            }
            debug!("Falling back to raw context");
        }
        state.task_queue.names()
    }

    /// Store an Execute result for later retrieval
    ///
    /// No-op under the raw strategy. Failures are logged and swallowed.
    pub async fn record_result(&self, task: &Task, result: &str) {
        if let Some(source) = &self.semantic {
            fail_open("record_result", || source.record(task, result)).await;
        }
    }
}

impl Default for ContextProvider {
    fn default() -> Self {
        Self::raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use taskloop_agent::VectorMatch;
    use taskloop_core::TaskloopError;
    use tokio::sync::Mutex;

    /// Returns canned matches and records upserts
    #[derive(Default)]
    struct FakeBackend {
        matches: Vec<VectorMatch>,
        upserts: Mutex<Vec<(String, Vec<f32>, VectorMetadata)>>,
        embedded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorBackend for FakeBackend {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embedded.lock().await.push(text.to_string());
            Ok(vec![1.0, 0.0])
        }

        async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }

        async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: VectorMetadata) -> Result<()> {
            self.upserts.lock().await.push((id.to_string(), vector, metadata));
            Ok(())
        }
    }

    struct DownBackend;

    #[async_trait]
    impl VectorBackend for DownBackend {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(TaskloopError::Vector("connection refused".to_string()))
        }

        async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<VectorMatch>> {
            Err(TaskloopError::Vector("connection refused".to_string()))
        }

        async fn upsert(&self, _id: &str, _vector: Vec<f32>, _metadata: VectorMetadata) -> Result<()> {
            Err(TaskloopError::Vector("connection refused".to_string()))
        }
    }

    fn hit(name: &str, score: f32) -> VectorMatch {
        VectorMatch {
            id: format!("result_{}", name),
            task_name: name.to_string(),
            result_text: String::new(),
            score,
        }
    }

    fn state() -> SharedState {
        let mut state = SharedState::new("Learn Rust", "seed");
        state.replace_queue(vec![Task::new(1, "A"), Task::new(2, "B")]);
        state
    }

    #[tokio::test]
    async fn test_raw_returns_queue_names_in_order() {
        let provider = ContextProvider::raw();
        assert_eq!(provider.strategy(), ContextStrategy::Raw);
        assert_eq!(provider.get_context(&state()).await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_raw_on_empty_queue_is_empty() {
        let mut state = state();
        state.replace_queue(Vec::new());
        assert!(ContextProvider::raw().get_context(&state).await.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_ranks_descending_and_keeps_ties_stable() {
        let backend = Arc::new(FakeBackend {
            matches: vec![hit("low", 0.1), hit("tie1", 0.5), hit("high", 0.9), hit("tie2", 0.5)],
            ..Default::default()
        });
        let provider = ContextProvider::semantic(backend.clone(), 10);
        assert_eq!(provider.strategy(), ContextStrategy::Semantic);

        let context = provider.get_context(&state()).await;
        assert_eq!(context, vec!["high", "tie1", "tie2", "low"]);
        assert_eq!(backend.embedded.lock().await.as_slice(), ["Learn Rust"]);
    }

    #[tokio::test]
    async fn test_semantic_respects_top_k() {
        let backend = Arc::new(FakeBackend {
            matches: vec![hit("a", 0.3), hit("b", 0.2), hit("c", 0.1)],
            ..Default::default()
        });
        let provider = ContextProvider::semantic(backend, 2);
        assert_eq!(provider.get_context(&state()).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_semantic_failure_falls_back_to_raw() {
        let provider = ContextProvider::semantic(Arc::new(DownBackend), 5);
        assert_eq!(provider.get_context(&state()).await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_record_result_upserts_by_task_id() {
        let backend = Arc::new(FakeBackend::default());
        let provider = ContextProvider::semantic(backend.clone(), 5);

        provider
            .record_result(&Task::new(7, "Summarize"), "line one\nline two")
            .await;

        let upserts = backend.upserts.lock().await;
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].0, "result_7");
        assert_eq!(upserts[0].2.task, "Summarize");
        assert_eq!(upserts[0].2.result, "line one\nline two");
        assert_eq!(backend.embedded.lock().await.as_slice(), ["line one line two"]);
    }

    #[tokio::test]
    async fn test_record_result_failure_is_swallowed() {
        let provider = ContextProvider::semantic(Arc::new(DownBackend), 5);
        provider.record_result(&Task::new(1, "A"), "result").await;
    }
}
