//! Dispatch queue and worker pool for the parallel crawler
//!
//! Visiting a resource enqueues one task per child, so the total number of
//! tasks is unknown until the crawl ends. The queue therefore counts tasks in
//! flight: a task counts from [`DispatchQueue::put`] until the worker that ran
//! it calls [`DispatchQueue::task_done`], and [`DispatchQueue::join`] returns
//! once that count is zero. Because a task enqueues its children before it is
//! marked done, the count can only reach zero when no work is left anywhere.

use crate::progress::Progresser;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long an idle worker waits for a task before re-checking for shutdown
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A deferred unit of crawl work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    drained: Condvar,
}

/// Unbounded multi-producer, multi-consumer task queue with completion tracking
#[derive(Clone)]
pub struct DispatchQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    in_flight: Arc<InFlight>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Enqueue a task; never blocks
    pub fn put(&self, task: Task) {
        *self.in_flight.count.lock() += 1;

        // Only fails once every receiver is gone, and this queue holds one
        if self.sender.send(task).is_err() {
            tracing::error!("Dispatch queue disconnected, dropping task");
            self.task_done();
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Task, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Mark one previously enqueued task as finished
    pub fn task_done(&self) {
        let mut count = self.in_flight.count.lock();
        debug_assert!(*count > 0, "task_done called more times than put");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.in_flight.drained.notify_all();
        }
    }

    /// Block until every task, including tasks enqueued by tasks, has finished
    pub fn join(&self) {
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            self.in_flight.drained.wait(&mut count);
        }
    }

    /// Tasks enqueued or running right now
    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed set of worker threads draining a [`DispatchQueue`]
///
/// Dropping the pool signals shutdown and joins every worker.
pub struct WorkerPool {
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(
        threads: usize,
        queue: &DispatchQueue,
        progresser: &Arc<dyn Progresser>,
    ) -> Result<Self> {
        let mut pool = Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::with_capacity(threads),
        };

        for index in 0..threads {
            let queue = queue.clone();
            let shutdown = Arc::clone(&pool.shutdown);
            let progresser = Arc::clone(progresser);

            let worker = thread::Builder::new()
                .name(format!("crawler-{}", index))
                .spawn(move || process_queue(&queue, &shutdown, progresser.as_ref()))
                .with_context(|| format!("Failed to spawn crawler worker {}", index))?;
            pool.workers.push(worker);
        }

        tracing::debug!("Started {} crawler workers", pool.workers.len());
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Signal shutdown and wait for every worker to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("Crawler worker exited with a panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn process_queue(queue: &DispatchQueue, shutdown: &AtomicBool, progresser: &dyn Progresser) {
    while !shutdown.load(Ordering::Acquire) {
        let task = match queue.recv_timeout(POLL_INTERVAL) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // A panicking task must still be marked done or join() never returns
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let error = anyhow::anyhow!("Crawler task panicked: {}", panic_message(panic.as_ref()));
            progresser.on_error(&error);
        }
        queue.task_done();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CrawlProgress;
    use std::sync::atomic::AtomicUsize;

    fn progresser() -> Arc<dyn Progresser> {
        Arc::new(CrawlProgress::new())
    }

    #[test]
    fn test_join_returns_immediately_when_empty() {
        let queue = DispatchQueue::new();
        queue.join();
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn test_counts_tasks_until_done() {
        let queue = DispatchQueue::new();
        queue.put(Box::new(|| {}));
        queue.put(Box::new(|| {}));
        assert_eq!(queue.in_flight(), 2);

        let task = queue.recv_timeout(POLL_INTERVAL).unwrap();
        task();
        queue.task_done();
        assert_eq!(queue.in_flight(), 1);
    }

    #[test]
    fn test_join_waits_for_tasks_spawned_by_tasks() {
        let queue = DispatchQueue::new();
        let progresser = progresser();
        let pool = WorkerPool::start(4, &queue, &progresser).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        // Each task fans out into two more until depth 6: 2^7 - 1 tasks in total
        fn fan_out(queue: DispatchQueue, ran: Arc<AtomicUsize>, depth: u32) -> Task {
            Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
                if depth < 6 {
                    for _ in 0..2 {
                        queue.put(fan_out(queue.clone(), ran.clone(), depth + 1));
                    }
                }
            })
        }

        queue.put(fan_out(queue.clone(), ran.clone(), 0));
        queue.join();

        assert_eq!(ran.load(Ordering::SeqCst), 127);
        assert_eq!(queue.in_flight(), 0);
        pool.shutdown();
    }

    #[test]
    fn test_panicking_task_is_reported_and_completed() {
        let queue = DispatchQueue::new();
        let progress = Arc::new(CrawlProgress::new());
        let progresser: Arc<dyn Progresser> = progress.clone();
        let pool = WorkerPool::start(1, &queue, &progresser).unwrap();

        queue.put(Box::new(|| panic!("facet parser exploded")));
        queue.join();
        pool.shutdown();

        let summary = progress.get_summary();
        assert_eq!(summary.errors, 1);
        assert!(summary.last_error.unwrap().contains("facet parser exploded"));
    }

    #[test]
    fn test_pool_starts_requested_workers_and_stops_on_drop() {
        let queue = DispatchQueue::new();
        let pool = WorkerPool::start(3, &queue, &progresser()).unwrap();
        assert_eq!(pool.size(), 3);
        drop(pool);

        // No worker is left to run this
        queue.put(Box::new(|| {}));
        assert_eq!(queue.in_flight(), 1);
    }
}
