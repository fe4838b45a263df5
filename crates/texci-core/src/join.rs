//! Join barrier: run N operations concurrently and collect every outcome.
//!
//! Unlike `try_join_all`, the barrier never short-circuits. Each operation is
//! spawned onto the runtime, and its outcome lands at the same index it was
//! submitted at, whatever order the operations finish in. An operation that
//! panics or is aborted is captured as a [`StageOutcome::Failure`] instead of
//! failing the barrier.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{warn, Instrument};

use crate::domain::{StageFailure, StageOutcome};

/// Await every operation and return their outcomes in input order.
pub async fn join_all_outcomes<T, F>(operations: Vec<F>) -> Vec<StageOutcome<T>>
where
    T: Send + 'static,
    F: Future<Output = StageOutcome<T>> + Send + 'static,
{
    let handles: Vec<JoinHandle<StageOutcome<T>>> = operations
        .into_iter()
        .map(|operation| tokio::spawn(operation.in_current_span()))
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(index, error = %e, "joined operation did not complete");
                StageOutcome::Failure(
                    StageFailure::new(format!("operation {} did not complete", index))
                        .with_cause(e),
                )
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn delayed(value: u32, delay_ms: u64) -> impl Future<Output = StageOutcome<u32>> + Send {
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            StageOutcome::Success(value)
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcomes: Vec<StageOutcome<u32>> =
            join_all_outcomes(Vec::<std::future::Ready<StageOutcome<u32>>>::new()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_despite_completion_order() {
        let ops = vec![delayed(0, 300), delayed(1, 100), delayed(2, 200)];
        let outcomes = join_all_outcomes(ops).await;
        let values: Vec<u32> = outcomes.iter().filter_map(|o| o.success().copied()).collect();
        assert_eq!(values, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_run_concurrently() {
        let start = tokio::time::Instant::now();
        let ops = vec![delayed(0, 100), delayed(1, 100), delayed(2, 100)];
        let outcomes = join_all_outcomes(ops).await;
        assert_eq!(outcomes.len(), 3);
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_failure_does_not_short_circuit() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut ops = Vec::new();
        for i in 0..4u32 {
            let finished = Arc::clone(&finished);
            ops.push(async move {
                tokio::time::sleep(Duration::from_millis(5 * u64::from(i))).await;
                finished.fetch_add(1, Ordering::SeqCst);
                if i == 0 {
                    StageOutcome::failure("first failed")
                } else {
                    StageOutcome::Success(i)
                }
            });
        }

        let outcomes = join_all_outcomes(ops).await;
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert!(!outcomes[0].is_success());
        assert!(outcomes[1..].iter().all(|o| o.is_success()));
    }

    async fn panics() -> StageOutcome<u32> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_operation_becomes_failure() {
        let ops: Vec<std::pin::Pin<Box<dyn Future<Output = StageOutcome<u32>> + Send>>> = vec![
            Box::pin(async { StageOutcome::Success(1u32) }),
            Box::pin(panics()),
            Box::pin(async { StageOutcome::Success(3u32) }),
        ];
        let outcomes = join_all_outcomes(ops).await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].success(), Some(&1));
        let failure = outcomes[1].as_failure().expect("panic captured");
        assert!(failure.message.contains("operation 1"));
        assert_eq!(outcomes[2].success(), Some(&3));
    }
}
