use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run independent tasks with at most `max_workers` in flight
///
/// Each task owns its input and returns its own result; results come back in input
/// order. A `max_workers` of zero is treated as one.
pub async fn run_bounded<I, F, Fut, T>(inputs: I, max_workers: usize, task: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(inputs.into_iter().map(task))
        .buffered(max_workers.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let results = run_bounded(vec![30u64, 10, 20], 3, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay
        })
        .await;

        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_never_exceeds_worker_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_bounded(0..12, 3, |n| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                n * 2
            }
        })
        .await;

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_zero_workers_still_runs() {
        let results = run_bounded(vec![1, 2], 0, |n| async move { n + 1 }).await;
        assert_eq!(results, vec![2, 3]);
    }
}
