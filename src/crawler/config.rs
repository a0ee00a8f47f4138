//! Crawler configuration

use crate::gcp::client::ApiClient;
use crate::progress::Progresser;
use crate::storage::Storage;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Worker threads used by the parallel crawler unless configured otherwise
pub const DEFAULT_THREADS: usize = 10;

/// Collaborators injected into a crawler
///
/// Immutable once built; crawlers share it across all their workers.
#[derive(Clone)]
pub struct CrawlerConfig {
    storage: Arc<dyn Storage>,
    progresser: Arc<dyn Progresser>,
    client: Arc<dyn ApiClient>,
    variables: HashMap<String, Value>,
    threads: usize,
}

impl CrawlerConfig {
    pub fn new(
        storage: Arc<dyn Storage>,
        progresser: Arc<dyn Progresser>,
        client: Arc<dyn ApiClient>,
    ) -> Self {
        Self {
            storage,
            progresser,
            client,
            variables: HashMap::new(),
            threads: DEFAULT_THREADS,
        }
    }

    /// Set the parallel crawler's worker count (ignored by the sequential crawler)
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        anyhow::ensure!(threads > 0, "Crawler needs at least one worker thread");
        self.threads = threads;
        Ok(self)
    }

    pub fn with_variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn progresser(&self) -> &Arc<dyn Progresser> {
        &self.progresser
    }

    pub fn client(&self) -> &dyn ApiClient {
        self.client.as_ref()
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl fmt::Debug for CrawlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerConfig")
            .field("variables", &self.variables)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}
