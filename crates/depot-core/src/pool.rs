//! Fixed-size pool for blocking jobs.

use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::error;

use crate::{error::MirrorError, MirrorResult};

/// Runs blocking jobs with at most `workers` in flight.
///
/// [`submit`](Self::submit) waits for a free slot, so the producer is throttled to the
/// pool's pace. [`join`](Self::join) is the completion barrier.
pub struct WorkerPool<T> {
    semaphore: Arc<Semaphore>,
    workers: usize,
    handles: Vec<JoinHandle<T>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            handles: Vec::new(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queues `job`, waiting until a worker slot is free.
    pub async fn submit<F>(&mut self, job: F) -> MirrorResult<()>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| MirrorError::TaskFailed(err.to_string()))?;

        self.handles.push(tokio::task::spawn_blocking(move || {
            let output = job();
            drop(permit);
            output
        }));
        Ok(())
    }

    /// Waits for every submitted job. Jobs that panicked are logged and left out.
    pub async fn join(self) -> Vec<T> {
        let mut outputs = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(output) => outputs.push(output),
                Err(err) => error!("worker task failed: {err}"),
            }
        }
        outputs
    }
}
