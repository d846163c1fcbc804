//! A small, fixed-size pool of OS threads fed by a channel of boxed
//! closures — the conventional "build your own thread pool" shape, used
//! here to run download-streaming workers off the dispatcher thread.

use std::thread::{self, JoinHandle};

use tracing::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size worker pool. Dropping it waits for in-flight jobs to finish.
pub struct WorkerPool {
    sender: Option<flume::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` worker threads, each looping on the shared job channel.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0; a pool with no workers can never make progress.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool must have at least one thread");

        let (sender, receiver) = flume::unbounded::<Job>();
        let workers = (0..size)
            .map(|id| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("rdft-download-worker-{id}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn download worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Queues `job` to run on the next free worker thread.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            if sender.send(Box::new(job)).is_err() {
                error!("worker pool channel closed, dropping job");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn runs_submitted_jobs() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        // `drop` joins all workers, so by the time we get here every job has
        // definitely run; the sleep below is just a guard against a future
        // change accidentally making submit() fire-and-forget past drop.
        thread::sleep(Duration::from_millis(10));
    }
}
