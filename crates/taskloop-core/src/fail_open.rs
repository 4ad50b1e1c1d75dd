//! Fail-open utilities for advisory operations
//!
//! Some work in the loop only improves output and must never end a run:
//! semantic context retrieval, recording results into the vector index,
//! and writing the activity log. Those go through [`fail_open`].
//!
//! DO NOT use fail-open for:
//! - Generation calls (a failed call ends the run)
//! - Queue operations (an empty queue ends the run)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Run an advisory operation, turning failure into `None`
///
/// Logs the error via `tracing::warn!` on failure.
///
/// ```no_run
/// use taskloop_core::fail_open::fail_open;
/// use taskloop_core::Result;
///
/// async fn fetch_context() -> Result<Vec<String>> {
///     Ok(vec!["previous task".to_string()])
/// }
///
/// async fn example() {
///     let context = fail_open("semantic_context", || fetch_context())
///         .await
///         .unwrap_or_default();
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!(operation = operation_name, error = %e, "advisory operation failed, continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskloopError;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, TaskloopError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(TaskloopError::Vector("index unreachable".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }
}
