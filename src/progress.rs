//! Crawl progress tracking
//!
//! Counts visited resources, errors and warnings as the crawl runs and
//! produces the [`Summary`] returned to the caller once it completes.

use crate::resource::ResourceKey;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Receives crawl events; called from every crawler worker concurrently
pub trait Progresser: Send + Sync {
    fn on_new_object(&self, key: &ResourceKey);

    fn on_error(&self, error: &anyhow::Error);

    fn on_warning(&self, error: &anyhow::Error);

    fn get_summary(&self) -> Summary;
}

/// Aggregate outcome of a crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub objects: u64,
    pub errors: u64,
    pub warnings: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_warning: Option<String>,
    pub elapsed_ms: u64,
}

impl Summary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }
}

/// Log a progress line every this many resources
const LOG_EVERY: u64 = 100;

/// Thread-safe counting progresser
pub struct CrawlProgress {
    started: Instant,
    objects: AtomicU64,
    errors: AtomicU64,
    warnings: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_warning: Mutex<Option<String>>,
}

impl CrawlProgress {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            objects: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            last_error: Mutex::new(None),
            last_warning: Mutex::new(None),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for CrawlProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progresser for CrawlProgress {
    fn on_new_object(&self, key: &ResourceKey) {
        let count = self.objects.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("Inventoried {}", key);
        if count % LOG_EVERY == 0 {
            tracing::info!("Crawled {} resources in {:?}", count, self.elapsed());
        }
    }

    fn on_error(&self, error: &anyhow::Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!("{:#}", error);
        *self.last_error.lock() = Some(format!("{:#}", error));
    }

    fn on_warning(&self, error: &anyhow::Error) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("{:#}", error);
        *self.last_warning.lock() = Some(format!("{:#}", error));
    }

    fn get_summary(&self) -> Summary {
        Summary {
            objects: self.objects.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
            last_warning: self.last_warning.lock().clone(),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}
