use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// A run that stopped early because a unit reported an error. `completed`
/// holds the results of every unit that finished successfully, `error` the
/// first failure of the last batch and `further_errors` the rest of them.
#[derive(Debug)]
pub struct Interrupted<R, E> {
    pub completed: Vec<R>,
    pub error: E,
    pub further_errors: Vec<E>,
}

/// Splits work into groups of at most `batch_size` units. The units of a group
/// run concurrently and the next group starts `delay` after the previous one has
/// fully resolved.
#[derive(Debug, Clone)]
pub struct Batcher {
    batch_size: usize,
    delay: Duration,
}

impl Batcher {
    pub fn new(batch_size: usize, delay: Duration) -> Batcher {
        Batcher {
            batch_size: batch_size.max(1),
            delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn batch_count(&self, items: usize) -> usize {
        (items + self.batch_size - 1) / self.batch_size
    }

    /// Runs `unit` over every item, `batch_size` at a time.
    ///
    /// Errors do not cancel the other units of their batch. Once the batch has
    /// resolved, the first error ends the run and no later batch is started.
    pub async fn run<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        unit: F,
    ) -> Result<Vec<R>, Interrupted<R, E>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let total_batches = self.batch_count(items.len());
        let mut completed = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter().peekable();
        let mut batch_number = 0;

        while remaining.peek().is_some() {
            batch_number += 1;
            let batch: Vec<Fut> = remaining
                .by_ref()
                .take(self.batch_size)
                .map(&unit)
                .collect();

            tracing::debug!(
                batch_number,
                total_batches,
                batch_size = batch.len(),
                "Starting batch"
            );

            let mut errors = Vec::new();
            for result in join_all(batch).await {
                match result {
                    Ok(output) => completed.push(output),
                    Err(error) => errors.push(error),
                }
            }

            let mut errors = errors.into_iter();
            if let Some(error) = errors.next() {
                tracing::warn!(batch_number, total_batches, "Batch run interrupted");
                return Err(Interrupted {
                    completed,
                    error,
                    further_errors: errors.collect(),
                });
            }

            if remaining.peek().is_some() {
                tokio::time::sleep(self.delay).await;
            }
        }

        Ok(completed)
    }
}
