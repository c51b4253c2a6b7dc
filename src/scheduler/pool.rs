use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fixed set of workers draining one FIFO channel
///
/// Workers share the receiving end, so a queued item goes to whichever
/// worker frees up first. The channel is unbounded and [`WorkerPool::dispatch`]
/// never waits.
pub struct WorkerPool<T> {
    sender: mpsc::UnboundedSender<T>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `num_workers` tasks running `handler` for every dispatched item
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(num_workers: usize, handler: F) -> Self
    where
        F: Fn(usize, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let num_workers = num_workers.max(1);
        info!(num_workers, "Starting worker pool");

        let (sender, receiver) = mpsc::unbounded_channel::<T>();
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);

        let workers = (0..num_workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    debug!(worker_id, "Worker started");
                    loop {
                        let next = receiver.lock().await.recv().await;
                        match next {
                            Some(item) => handler(worker_id, item).await,
                            None => break,
                        }
                    }
                    debug!(worker_id, "Worker stopped");
                })
            })
            .collect();

        Self { sender, workers }
    }

    /// Queue an item; hands it back if the pool is closed
    pub fn dispatch(&self, item: T) -> Result<(), T> {
        self.sender.send(item).map_err(|err| {
            warn!("Worker pool closed, item not delivered");
            err.0
        })
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// True while every worker task is alive
    pub fn health_check(&self) -> bool {
        !self.sender.is_closed() && self.workers.iter().all(|w| !w.is_finished())
    }

    /// Close the channel and wait for queued items to drain
    pub async fn shutdown(self) {
        let Self { sender, workers } = self;
        drop(sender);
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "Worker terminated abnormally");
            }
        }
        info!("Worker pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_every_item_handled_once() {
        let handled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&handled);
        let pool = WorkerPool::spawn(3, move |_worker, n: usize| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(n, Ordering::SeqCst);
            }
        });
        assert_eq!(pool.num_workers(), 3);

        for n in 1..=10 {
            pool.dispatch(n).unwrap();
        }
        pool.shutdown().await;

        assert_eq!(handled.load(Ordering::SeqCst), 55);
    }

    #[tokio::test]
    async fn test_single_worker_keeps_fifo_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(1, move |_worker, n: u32| {
            let tx = tx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                let _ = tx.send(n);
            }
        });

        for n in 0..5 {
            pool.dispatch(n).unwrap();
        }
        pool.shutdown().await;

        let mut seen = Vec::new();
        while let Ok(n) = rx.try_recv() {
            seen.push(n);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_zero_workers_means_one() {
        let pool = WorkerPool::spawn(0, |_worker, _item: ()| async {});
        assert_eq!(pool.num_workers(), 1);
        assert!(pool.health_check());
    }
}
