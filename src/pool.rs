//! Persistent worker threads for row-strip detection.
//!
//! Every worker owns one thread and a private task queue. Tasks are queued
//! with [`Worker::add`]; [`WorkerPool::wait`] blocks until all queues are
//! drained and every worker is idle. Dropping the pool stops and joins the
//! threads.

use crate::trace::trace_warn;
use crate::util::{DetectionError, DetectionResult};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    active: bool,
    stop: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    /// Signalled when a task is queued or the worker must stop.
    work: Condvar,
    /// Signalled when the worker becomes idle with an empty queue.
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        // Tasks run outside the lock, so a poisoned queue is still consistent.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A single persistent worker thread.
pub struct Worker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(index: usize) -> DetectionResult<Self> {
        let shared = Arc::new(Shared::default());
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("cascadet-worker-{index}"))
            .spawn(move || run(&thread_shared))
            .map_err(|err| DetectionError::Spawn {
                reason: err.to_string(),
            })?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Queues a task and wakes the worker.
    pub fn add<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.lock();
        queue.tasks.push_back(Box::new(task));
        self.shared.work.notify_one();
    }

    /// Blocks until the queue is empty and no task is running.
    pub fn wait(&self) {
        let mut queue = self.shared.lock();
        while !queue.tasks.is_empty() || queue.active {
            queue = self
                .shared
                .idle
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shared.lock().stop = true;
        self.shared.work.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    queue.active = true;
                    break task;
                }
                if queue.stop {
                    return;
                }
                queue = shared
                    .work
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            trace_warn!("worker_task_panicked", thread = thread::current().name().unwrap_or(""));
        }

        let mut queue = shared.lock();
        queue.active = false;
        if queue.tasks.is_empty() {
            shared.idle.notify_all();
        }
    }
}

/// Resolves the requested thread count against hardware concurrency.
///
/// `0` and counts above the hardware maximum select the hardware maximum.
pub fn resolve_thread_count(requested: usize) -> usize {
    let hardware = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if requested == 0 || requested > hardware {
        hardware
    } else {
        requested
    }
}

/// A fixed set of workers. A pool of one thread or fewer holds no workers
/// and callers run tasks synchronously.
#[derive(Default)]
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Creates `resolve_thread_count(thread_count)` workers, or none when
    /// that resolves to one.
    pub fn new(thread_count: usize) -> DetectionResult<Self> {
        let count = resolve_thread_count(thread_count);
        if count <= 1 {
            return Ok(Self::default());
        }
        Self::with_workers(count)
    }

    /// Spawns exactly `count` workers, ignoring hardware concurrency.
    pub(crate) fn with_workers(count: usize) -> DetectionResult<Self> {
        let workers = (0..count)
            .map(Worker::spawn)
            .collect::<DetectionResult<Vec<_>>>()?;
        Ok(Self { workers })
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Waits for every worker to finish its queue.
    pub fn wait(&self) {
        for worker in &self.workers {
            worker.wait();
        }
    }
}
