// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component E: the fixed-size task thread pool (§4.E). Sized once at
//! filter configuration; runs submitted jobs to completion with no
//! cancellation. Submission is synchronous with respect to queue
//! admission; execution is asynchronous on a worker thread.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Soft high-water mark (§4.E default): once the queue holds this many
/// outstanding jobs, [`TaskPool::queue_len`] signals the Session it should
/// delay its next read.
pub const HIGH_WATER_MARK: usize = 1024;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of OS worker threads draining a shared job queue.
pub struct TaskPool {
    sender: Option<Sender<Job>>,
    queue_len: Arc<AtomicUsize>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl TaskPool {
    /// Spawns `workers` OS threads, each looping on the shared queue until
    /// the pool is dropped (closing the channel).
    pub fn new(workers: usize) -> Self {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = unbounded();
        let queue_len = Arc::new(AtomicUsize::new(0));

        let handles = (0..workers.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                let queue_len = Arc::clone(&queue_len);
                std::thread::Builder::new()
                    .name(format!("task-worker-{id}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            queue_len.fetch_sub(1, Ordering::Relaxed);
                            job();
                        }
                    })
                    .expect("failed to spawn task worker thread")
            })
            .collect();

        Self { sender: Some(sender), queue_len, workers: handles }
    }

    /// Submits a job. The caller owns the job's memory until a worker takes
    /// it off the queue; admission itself never blocks.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue_len.fetch_add(1, Ordering::Relaxed);
        let sent = self.sender.as_ref().is_some_and(|sender| sender.send(Box::new(job)).is_ok());
        if !sent {
            tracing::error!("task pool queue is closed; dropping job");
            self.queue_len.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Number of jobs submitted but not yet picked up by a worker.
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Whether the pool has crossed the soft high-water mark and the
    /// caller should delay its next read (§4.E back-pressure).
    pub fn is_saturated(&self) -> bool {
        self.queue_len() >= HIGH_WATER_MARK
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Workers exit once every `Sender` clone is gone and `recv` returns
        // `Err`. The pool's own field is the last clone, so it must be
        // dropped explicitly here, before joining — otherwise every worker
        // blocks on `recv()` forever and this never returns.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
