//! Traversal shared by both crawlers
//!
//! A crawler is a [`Visitor`]: it knows how to visit one resource, how to
//! persist it, and how to dispatch the visit of a child. [`crawl`] ties those
//! together for a whole sub-tree.
//!
//! Faults are tiered. A resource whose own visit fails is reported as an
//! error and its sub-tree is abandoned. The task that dispatched it then
//! downgrades that failure to a warning, so siblings and cousins are still
//! crawled.

use super::config::CrawlerConfig;
use super::queue::Task;
use crate::resource::{Facet, Resource, ResourceKey};
use anyhow::{Context, Result};
use std::sync::Arc;

pub trait Visitor: Send + Sync + 'static {
    fn config(&self) -> &CrawlerConfig;

    /// Run, or schedule, the visit of a child sub-tree
    fn dispatch(&self, task: Task);

    /// Persist a freshly visited resource
    fn write(&self, resource: &dyn Resource) -> Result<()>;

    /// Re-persist a resource already written; faults are reported then returned
    fn update(&self, resource: &dyn Resource) -> Result<()>;

    /// Record the failure of a child as a warning; never fails
    fn on_child_error(&self, error: &anyhow::Error);

    /// Fetch every facet of `resource` and write it
    ///
    /// Reports exactly one of `on_new_object` or `on_error` to the progresser.
    fn visit(&self, resource: &mut dyn Resource) -> Result<()> {
        let key = resource.key();
        let progresser = self.config().progresser();

        match fetch_and_write(self, resource, &key) {
            Ok(()) => {
                progresser.on_new_object(&key);
                Ok(())
            }
            Err(error) => {
                progresser.on_error(&error);
                Err(error)
            }
        }
    }
}

fn fetch_and_write<V: Visitor + ?Sized>(
    visitor: &V,
    resource: &mut dyn Resource,
    key: &ResourceKey,
) -> Result<()> {
    let client = visitor.config().client();
    for facet in Facet::VISIT_ORDER {
        resource
            .fetch_facet(facet, client)
            .with_context(|| format!("Failed to fetch {} of {}", facet, key))?;
    }

    visitor
        .write(resource)
        .with_context(|| format!("Failed to write {}", key))
}

/// Visit `resource` and dispatch the crawl of each of its children
///
/// Returns the resource's own fault; faults below it are handled by the
/// dispatched child tasks and never surface here.
pub fn crawl<V: Visitor>(visitor: &Arc<V>, mut resource: Box<dyn Resource>) -> Result<()> {
    visitor.visit(&mut *resource)?;

    let mut listing_failed = false;
    for listing in resource.list_children(visitor.config().client()) {
        match listing {
            Ok(children) => {
                for child in children {
                    visitor.dispatch(child_task(visitor, child));
                }
            }
            Err(error) => {
                resource.add_warning(format!("{:#}", error));
                visitor.on_child_error(&error);
                listing_failed = true;
            }
        }
    }

    if listing_failed {
        visitor.update(&*resource)?;
    }

    Ok(())
}

/// Task crawling `child`, with its own fault boundary
fn child_task<V: Visitor>(visitor: &Arc<V>, child: Box<dyn Resource>) -> Task {
    let visitor = Arc::clone(visitor);
    Box::new(move || {
        if let Err(error) = crawl(&visitor, child) {
            visitor.on_child_error(&error);
        }
    })
}

/// Message stored for a child warning
pub(crate) fn warning_message(error: &anyhow::Error) -> String {
    format!("{:#}\n", error)
}

/// Storage update with the error reporting shared by both crawlers
pub(crate) fn report_update(
    config: &CrawlerConfig,
    resource: &dyn Resource,
    stored: Result<()>,
) -> Result<()> {
    match stored.with_context(|| format!("Failed to update {}", resource.key())) {
        Ok(()) => Ok(()),
        Err(error) => {
            config.progresser().on_error(&error);
            Err(error)
        }
    }
}

/// Progress half of `on_child_error`, once the warning has been stored (or not)
pub(crate) fn report_child_error(config: &CrawlerConfig, error: &anyhow::Error, stored: Result<()>) {
    if let Err(storage_error) = stored {
        tracing::error!("Failed to store crawl warning: {:#}", storage_error);
    }
    config.progresser().on_warning(error);
}
