//! Storage sinks
//!
//! Where visited resources end up. The crawler serializes every call into a
//! sink itself, so implementations only need to be `Sync` to be shared, not
//! to tolerate concurrent writes.
//!
//! - [`memory`] - Keeps everything in memory (tests, dry runs)
//! - [`jsonl`] - Appends one JSON object per event to a file

pub mod jsonl;
pub mod memory;

use crate::resource::Resource;
use anyhow::Result;

pub use jsonl::JsonLinesStorage;
pub use memory::MemoryStorage;

pub trait Storage: Send + Sync {
    /// Persist a newly visited resource
    fn write(&self, resource: &dyn Resource) -> Result<()>;

    /// Persist new information about an already written resource
    fn update(&self, resource: &dyn Resource) -> Result<()>;

    /// Record a warning raised while crawling
    fn warning(&self, message: &str) -> Result<()>;
}
