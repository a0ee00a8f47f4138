//! In-memory storage

use super::Storage;
use crate::resource::{Resource, ResourceKey, ResourceRecord};
use anyhow::Result;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Inventory {
    writes: Vec<ResourceRecord>,
    updates: Vec<ResourceRecord>,
    warnings: Vec<String>,
}

/// Storage that keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inventory: Mutex<Inventory>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<ResourceRecord> {
        self.inventory.lock().writes.clone()
    }

    pub fn updates(&self) -> Vec<ResourceRecord> {
        self.inventory.lock().updates.clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.inventory.lock().warnings.clone()
    }

    /// Keys of written resources, sorted so crawls can be compared as sets
    pub fn written_keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self
            .inventory
            .lock()
            .writes
            .iter()
            .map(|r| r.key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Storage for MemoryStorage {
    fn write(&self, resource: &dyn Resource) -> Result<()> {
        self.inventory.lock().writes.push(resource.record());
        Ok(())
    }

    fn update(&self, resource: &dyn Resource) -> Result<()> {
        self.inventory.lock().updates.push(resource.record());
        Ok(())
    }

    fn warning(&self, message: &str) -> Result<()> {
        self.inventory.lock().warnings.push(message.to_string());
        Ok(())
    }
}
