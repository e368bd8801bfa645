use roster_core::{Result, StorageError};
use std::future::Future;
use std::time::Duration;

/// Runs a backend call under a deadline.
///
/// The in-flight call is dropped when `limit` elapses and the caller sees
/// [`StorageError::Timeout`]. Nothing is retried.
pub(crate) async fn with_timeout<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(format!(
            "{operation} exceeded {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_results_within_deadline() {
        let value = with_timeout("count users", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn passes_through_errors_within_deadline() {
        let err = with_timeout::<(), _>("add entity", Duration::from_secs(1), async {
            Err(StorageError::Query("boom".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::Query(_)));
    }

    #[tokio::test]
    async fn elapsed_deadline_is_a_timeout() {
        let err = with_timeout::<(), _>("get entities", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        match err {
            StorageError::Timeout(message) => assert!(message.starts_with("get entities")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
