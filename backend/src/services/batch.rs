use std::{future::Future, time::Duration};

use tokio::task::JoinSet;

/// Runs `task` over `items` in fixed-size concurrent batches, sleeping `delay`
/// between batches. Results come back in input order; a task that panics is
/// logged and left out.
pub async fn run_in_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    delay: Duration,
    task: F,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let batch_size = batch_size.max(1);
    let total = items.len();
    let mut results: Vec<(usize, R)> = Vec::with_capacity(total);
    let mut pending = items.into_iter().enumerate().peekable();

    while pending.peek().is_some() {
        let mut set = JoinSet::new();
        for (index, item) in pending.by_ref().take(batch_size) {
            let fut = task(item);
            set.spawn(async move { (index, fut.await) });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => tracing::warn!(error = %err, "Batched task failed to complete"),
            }
        }
        if pending.peek().is_some() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test]
    async fn results_keep_input_order() {
        let items: Vec<u64> = (0..7).collect();
        let out = run_in_batches(items, 3, Duration::ZERO, |n| async move {
            tokio::time::sleep(Duration::from_millis(7 - n)).await;
            n * 10
        })
        .await;
        assert_eq!(out, vec![0, 10, 20, 30, 40, 50, 60]);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_batch_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..10).collect();
        run_in_batches(items, 4, Duration::from_millis(1), |_| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let out: Vec<u8> = run_in_batches(Vec::<u8>::new(), 5, Duration::ZERO, |n| async move { n }).await;
        assert!(out.is_empty());
    }
}
