//! Bounded-concurrency task runner.
//!
//! A dispatcher task walks the inputs and acquires a semaphore permit before
//! spawning each worker, so no more than `limit` workers exist at once no
//! matter how many inputs there are. Results flow back over an mpsc channel
//! as they complete.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::error::{Result, ScanError};

type SkipPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Runs an async worker over many inputs with at most `limit` in flight.
#[derive(Clone)]
pub struct BoundedRunner {
    limit: usize,
    skip_pending: Option<SkipPredicate>,
}

impl BoundedRunner {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ScanError::InvalidConcurrency);
        }
        Ok(Self {
            limit,
            skip_pending: None,
        })
    }

    /// Stop dispatching new inputs once `predicate` returns true.
    ///
    /// Workers already started still run to completion.
    pub fn skip_pending_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.skip_pending = Some(Arc::new(predicate));
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Start running `worker` over `inputs`, yielding results as they finish.
    pub fn spawn<I, T, R, F, Fut>(&self, inputs: I, worker: F) -> RunnerStream<R>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.limit);
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let worker = Arc::new(worker);
        let skip_pending = self.skip_pending.clone();
        let inputs = inputs.into_iter();

        let dispatcher = tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            let mut dispatched = 0usize;

            for input in inputs {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                if skip_pending.as_ref().is_some_and(|skip| skip()) {
                    tracing::debug!(dispatched, "Skipping pending inputs");
                    break;
                }

                let worker = worker.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let result = worker(input).await;
                    // The receiver may already be gone; the result is simply dropped.
                    let _ = tx.send(result).await;
                    drop(permit);
                });
                dispatched += 1;

                while let Some(joined) = tasks.try_join_next() {
                    log_join(joined);
                }
            }

            drop(tx);

            while let Some(joined) = tasks.join_next().await {
                log_join(joined);
            }

            dispatched
        });

        RunnerStream { rx, dispatcher }
    }

    /// Run `worker` over every input and collect all results.
    ///
    /// Result order is unspecified.
    pub async fn run<I, T, R, F, Fut>(&self, inputs: I, worker: F) -> Vec<R>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mut stream = self.spawn(inputs, worker);
        let mut results = Vec::new();
        while let Some(result) = stream.recv().await {
            results.push(result);
        }
        stream.finish().await;
        results
    }
}

fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }
}

/// Results of a running [`BoundedRunner::spawn`] call.
pub struct RunnerStream<R> {
    rx: mpsc::Receiver<R>,
    dispatcher: JoinHandle<usize>,
}

impl<R> RunnerStream<R> {
    /// Next finished result, or `None` once every worker has finished.
    pub async fn recv(&mut self) -> Option<R> {
        self.rx.recv().await
    }

    /// Wait for every remaining worker, discarding results.
    ///
    /// Returns the number of workers that were dispatched.
    pub async fn drain(mut self) -> usize {
        while self.rx.recv().await.is_some() {}
        self.finish().await
    }

    /// Wait for the dispatcher after the stream has ended.
    pub async fn finish(self) -> usize {
        drop(self.rx);
        match self.dispatcher.await {
            Ok(dispatched) => dispatched,
            Err(e) => {
                tracing::error!(error = %e, "Runner dispatcher failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_limit_is_rejected() {
        assert!(matches!(
            BoundedRunner::new(0),
            Err(ScanError::InvalidConcurrency)
        ));
    }

    #[tokio::test]
    async fn test_every_input_yields_a_result() {
        let runner = BoundedRunner::new(4).unwrap();
        let mut results = runner.run(0..100u32, |n| async move { n * 2 }).await;
        results.sort_unstable();
        assert_eq!(results, (0..100u32).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runner = BoundedRunner::new(3).unwrap();

        let (a, p) = (active.clone(), peak.clone());
        let results = runner
            .run(0..20, move |_| {
                let active = a.clone();
                let peak = p.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_limit_larger_than_inputs() {
        let runner = BoundedRunner::new(64).unwrap();
        let results = runner.run(vec!["a", "b"], |s| async move { s.len() }).await;
        assert_eq!(results, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_panicking_worker_yields_no_result() {
        let runner = BoundedRunner::new(2).unwrap();
        let results = runner
            .run(0..5u32, |n| async move {
                if n == 3 {
                    panic!("boom");
                }
                n
            })
            .await;
        assert_eq!(results.len(), 4);
        assert!(!results.contains(&3));
    }

    #[tokio::test]
    async fn test_panics_during_long_dispatch() {
        let runner = BoundedRunner::new(1).unwrap();
        let results = runner
            .run(0..200u32, |n| async move {
                if n % 10 == 0 {
                    panic!("worker {n} failed");
                }
                tokio::task::yield_now().await;
                n
            })
            .await;
        assert_eq!(results.len(), 180);
        assert!(results.iter().all(|n| n % 10 != 0));
    }

    #[tokio::test]
    async fn test_skip_pending_stops_dispatch() {
        let stop = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicUsize::new(0));

        let flag = stop.clone();
        let runner = BoundedRunner::new(2)
            .unwrap()
            .skip_pending_when(move || flag.load(Ordering::SeqCst));

        let counter = started.clone();
        let mut stream = runner.spawn(0..50, move |n| {
            let started = counter.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                n
            }
        });

        assert!(stream.recv().await.is_some());
        stop.store(true, Ordering::SeqCst);
        let dispatched = stream.drain().await;

        assert!(dispatched < 50);
        assert_eq!(started.load(Ordering::SeqCst), dispatched);
    }

    #[tokio::test]
    async fn test_drain_without_skip_dispatches_everything() {
        let started = Arc::new(AtomicUsize::new(0));
        let runner = BoundedRunner::new(2).unwrap();

        let counter = started.clone();
        let mut stream = runner.spawn(0..20, move |n| {
            let started = counter.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                n
            }
        });

        assert!(stream.recv().await.is_some());
        assert_eq!(stream.drain().await, 20);
        assert_eq!(started.load(Ordering::SeqCst), 20);
    }
}
