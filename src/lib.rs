//! gcp-inventory - crawl a GCP resource hierarchy into an inventory
//!
//! Starting from an organization, folder or project, every reachable
//! resource is visited once: its IAM and data-access policies, billing info
//! and enabled APIs are fetched and the result is written to a storage sink.
//! A failing sub-tree is reported and skipped; the rest of the crawl goes on.
//!
//! # Modules
//!
//! - [`crawler`] - Sequential and parallel crawl engines
//! - [`resource`] - The [`resource::Resource`] trait and the GCP hierarchy
//! - [`gcp`] - Authentication and REST clients
//! - [`storage`] - Storage sinks
//! - [`progress`] - Progress counting and the final [`progress::Summary`]
//! - [`config`] - Persistent user configuration

pub mod config;
pub mod crawler;
pub mod gcp;
pub mod progress;
pub mod resource;
pub mod storage;

pub use crawler::{run_crawler, CrawlOptions, Crawler, CrawlerConfig, ParallelCrawler};

/// Version injected at compile time via GCP_INVENTORY_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("GCP_INVENTORY_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
