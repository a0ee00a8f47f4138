//! Resource hierarchy crawler
//!
//! Walks a resource tree from a root, fetching each resource's facets and
//! writing it to storage, and keeps going when individual sub-trees fail.
//!
//! # Module Structure
//!
//! - [`config`] - [`CrawlerConfig`], the injected collaborators
//! - [`visitor`] - Visit and error-isolation logic shared by both crawlers
//! - [`sequential`] - [`Crawler`], depth-first on the calling thread
//! - [`parallel`] - [`ParallelCrawler`], a worker pool over a dispatch queue
//! - [`queue`] - [`DispatchQueue`] and [`WorkerPool`]
//!
//! # Example
//!
//! ```ignore
//! let summary = run_crawler(storage, progresser, client, root, &CrawlOptions::default())?;
//! println!("{} resources, {} errors", summary.objects, summary.errors);
//! ```

pub mod config;
pub mod parallel;
pub mod queue;
pub mod sequential;
pub mod visitor;

pub use config::{CrawlerConfig, DEFAULT_THREADS};
pub use parallel::ParallelCrawler;
pub use queue::{DispatchQueue, Task, WorkerPool};
pub use sequential::Crawler;
pub use visitor::{crawl, Visitor};

use crate::gcp::client::ApiClient;
use crate::progress::{Progresser, Summary};
use crate::resource::Resource;
use crate::storage::Storage;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// How to run a crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Use [`ParallelCrawler`] rather than [`Crawler`]
    pub parallel: bool,
    pub threads: usize,
    pub variables: HashMap<String, Value>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: DEFAULT_THREADS,
            variables: HashMap::new(),
        }
    }
}

/// Crawl from an already resolved root and return the progresser's summary
///
/// Fails only when the root itself cannot be visited (or the worker pool
/// cannot be started); failures below the root are counted in the summary.
pub fn run_crawler(
    storage: Arc<dyn Storage>,
    progresser: Arc<dyn Progresser>,
    client: Arc<dyn ApiClient>,
    root: Box<dyn Resource>,
    options: &CrawlOptions,
) -> Result<Summary> {
    let config = CrawlerConfig::new(storage, progresser, client)
        .with_variables(options.variables.clone())
        .with_threads(options.threads)?;

    let progresser = if options.parallel {
        ParallelCrawler::new(config).run(root)?
    } else {
        Crawler::new(config).run(root)?
    };

    Ok(progresser.get_summary())
}
