//! Multi-threaded crawler
//!
//! Children are not crawled in place: each child visit becomes a task on a
//! shared [`DispatchQueue`] drained by a fixed pool of worker threads, so
//! unrelated sub-trees are crawled at the same time. Storage calls are
//! serialized behind a single write lock.

use super::config::CrawlerConfig;
use super::queue::{DispatchQueue, Task, WorkerPool};
use super::visitor::{self, crawl, Visitor};
use crate::progress::Progresser;
use crate::resource::Resource;
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct ParallelCrawler {
    inner: Arc<ParallelVisitor>,
}

struct ParallelVisitor {
    config: CrawlerConfig,
    write_lock: Mutex<()>,
    queue: DispatchQueue,
}

impl ParallelCrawler {
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            inner: Arc::new(ParallelVisitor {
                config,
                write_lock: Mutex::new(()),
                queue: DispatchQueue::new(),
            }),
        }
    }

    /// Crawl `resource` and everything below it with `threads` workers
    ///
    /// Returns once no task is queued or running and every worker has exited.
    /// A fault in the root's own visit is returned (after being reported), as
    /// is a root task that panicked.
    pub fn run(&self, resource: Box<dyn Resource>) -> Result<Arc<dyn Progresser>> {
        let visitor = &self.inner;
        let config = visitor.config();

        tracing::info!(
            "Starting parallel crawl of {} with {} workers (variables: {:?})",
            resource.key(),
            config.threads(),
            config.variables()
        );

        let pool = WorkerPool::start(config.threads(), &visitor.queue, config.progresser())?;

        // The root has no parent to downgrade its fault, so keep its outcome
        // for the caller; an empty slot means the root task never finished
        let root_key = resource.key();
        let root_outcome = Arc::new(Mutex::new(None));
        let root_task: Task = {
            let visitor = Arc::clone(visitor);
            let root_outcome = Arc::clone(&root_outcome);
            Box::new(move || {
                let outcome = crawl(&visitor, resource);
                *root_outcome.lock() = Some(outcome);
            })
        };

        visitor.dispatch(root_task);
        visitor.queue.join();
        pool.shutdown();

        tracing::info!("Parallel crawl finished");

        let outcome = root_outcome.lock().take();
        match outcome {
            Some(Ok(())) => Ok(Arc::clone(config.progresser())),
            Some(Err(error)) => Err(error),
            None => Err(anyhow::anyhow!("Crawl of {} did not complete", root_key)),
        }
    }

    /// Tasks currently queued or running
    pub fn in_flight(&self) -> usize {
        self.inner.queue.in_flight()
    }
}

impl Visitor for ParallelVisitor {
    fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    fn dispatch(&self, task: Task) {
        self.queue.put(task);
    }

    fn write(&self, resource: &dyn Resource) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.config.storage().write(resource)
    }

    fn update(&self, resource: &dyn Resource) -> Result<()> {
        let stored = {
            let _guard = self.write_lock.lock();
            self.config.storage().update(resource)
        };
        visitor::report_update(&self.config, resource, stored)
    }

    fn on_child_error(&self, error: &anyhow::Error) {
        let message = visitor::warning_message(error);
        let stored = {
            let _guard = self.write_lock.lock();
            self.config.storage().warning(&message)
        };
        visitor::report_child_error(&self.config, error, stored);
    }
}
