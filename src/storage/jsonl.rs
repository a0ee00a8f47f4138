//! JSON-lines storage
//!
//! Each write, update and warning becomes one line:
//!
//! ```text
//! {"inventory_id":"…","recorded_at":"2026-01-01T00:00:00Z","op":"write","record":{…}}
//! {"inventory_id":"…","recorded_at":"2026-01-01T00:00:01Z","op":"warning","message":"…"}
//! ```

use super::Storage;
use crate::resource::{Resource, ResourceRecord};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Event<'a> {
    Write { record: ResourceRecord },
    Update { record: ResourceRecord },
    Warning { message: &'a str },
}

#[derive(Serialize)]
struct Line<'a> {
    inventory_id: &'a str,
    recorded_at: String,
    #[serde(flatten)]
    event: Event<'a>,
}

/// Storage appending one JSON document per line to a file
pub struct JsonLinesStorage {
    inventory_id: String,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesStorage {
    /// Create (or truncate) the inventory file, creating parent directories
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(&path)
            .with_context(|| format!("Failed to create inventory file {}", path.display()))?;

        let inventory_id = Uuid::new_v4().to_string();
        tracing::info!("Writing inventory {} to {}", inventory_id, path.display());

        Ok(Self {
            inventory_id,
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Unique id stamped on every line of this inventory
    pub fn inventory_id(&self) -> &str {
        &self.inventory_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))
    }

    fn append(&self, event: Event<'_>) -> Result<()> {
        let line = Line {
            inventory_id: &self.inventory_id,
            recorded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        };

        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, &line).context("Failed to serialize inventory line")?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("Failed to write to {}", self.path.display()))
    }
}

impl Storage for JsonLinesStorage {
    fn write(&self, resource: &dyn Resource) -> Result<()> {
        self.append(Event::Write {
            record: resource.record(),
        })
    }

    fn update(&self, resource: &dyn Resource) -> Result<()> {
        self.append(Event::Update {
            record: resource.record(),
        })
    }

    fn warning(&self, message: &str) -> Result<()> {
        self.append(Event::Warning { message })
    }
}
