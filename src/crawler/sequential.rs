//! Single-threaded crawler
//!
//! Dispatching a child runs it on the spot, so the crawl is a plain
//! depth-first walk: a resource and its whole sub-tree are done before the
//! next sibling starts.

use super::config::CrawlerConfig;
use super::queue::Task;
use super::visitor::{self, crawl, Visitor};
use crate::progress::Progresser;
use crate::resource::Resource;
use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct Crawler {
    config: Arc<CrawlerConfig>,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Crawl `resource` and everything below it
    ///
    /// A fault in the root's own visit is returned (after being reported);
    /// faults below the root only show up in the progresser.
    pub fn run(&self, resource: Box<dyn Resource>) -> Result<Arc<dyn Progresser>> {
        tracing::info!(
            "Starting sequential crawl of {} (variables: {:?})",
            resource.key(),
            self.config.variables()
        );

        crawl(&Arc::new(self.clone()), resource)?;

        tracing::info!("Sequential crawl finished");
        Ok(Arc::clone(self.config.progresser()))
    }
}

impl Visitor for Crawler {
    fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    fn dispatch(&self, task: Task) {
        task();
    }

    fn write(&self, resource: &dyn Resource) -> Result<()> {
        self.config.storage().write(resource)
    }

    fn update(&self, resource: &dyn Resource) -> Result<()> {
        let stored = self.config.storage().update(resource);
        visitor::report_update(&self.config, resource, stored)
    }

    fn on_child_error(&self, error: &anyhow::Error) {
        let stored = self.config.storage().warning(&visitor::warning_message(error));
        visitor::report_child_error(&self.config, error, stored);
    }
}
