//! Resource abstraction layer
//!
//! Everything the crawler knows about a node of the resource hierarchy goes
//! through the [`Resource`] trait: its identity, the metadata facets it can
//! fetch, and the child collections it can enumerate. The crawler never looks
//! inside a resource beyond that.
//!
//! # Architecture
//!
//! - [`tree`] - The GCP hierarchy: organizations, folders, projects and their
//!   buckets, datasets and Cloud SQL instances
//! - [`fetcher`] - Paginated list calls shared by every child collection

pub mod fetcher;
pub mod tree;

use crate::gcp::client::ApiClient;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub use fetcher::{extract_items, extract_str, list_all, list_pages, Paged};
pub use tree::{from_root_id, GcpResource, ResourceKind};

/// One child collection of a resource; each collection fails independently
pub type ChildListing = Result<Vec<Box<dyn Resource>>>;

/// Identity of a resource: its type and its id within that type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceKey {
    pub kind: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Metadata facets fetched for every visited resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    IamPolicy,
    GcsPolicy,
    DatasetPolicy,
    CloudSqlPolicy,
    BillingInfo,
    EnabledApis,
}

impl Facet {
    /// Order in which a visit fetches facets
    pub const VISIT_ORDER: [Facet; 6] = [
        Facet::IamPolicy,
        Facet::GcsPolicy,
        Facet::DatasetPolicy,
        Facet::CloudSqlPolicy,
        Facet::BillingInfo,
        Facet::EnabledApis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IamPolicy => "IAM policy",
            Self::GcsPolicy => "GCS policy",
            Self::DatasetPolicy => "dataset policy",
            Self::CloudSqlPolicy => "Cloud SQL policy",
            Self::BillingInfo => "billing info",
            Self::EnabledApis => "enabled APIs",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable snapshot of a resource, as handed to storage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
    pub key: ResourceKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceKey>,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iam_policy: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs_policy: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_policy: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudsql_policy: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_apis: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ResourceRecord {
    pub fn new(key: ResourceKey, parent: Option<ResourceKey>, data: Value) -> Self {
        Self {
            key,
            parent,
            data,
            iam_policy: None,
            gcs_policy: None,
            dataset_policy: None,
            cloudsql_policy: None,
            billing_info: None,
            enabled_apis: None,
            warnings: Vec::new(),
        }
    }
}

/// A node of the resource hierarchy
///
/// Facet fetches default to no-ops so a resource only implements the ones
/// that apply to it. A resource is owned by whichever crawler task visits it
/// and is dropped once its children have been dispatched.
pub trait Resource: Send {
    fn key(&self) -> ResourceKey;

    fn fetch_iam_policy(&mut self, _client: &dyn ApiClient) -> Result<()> {
        Ok(())
    }

    fn fetch_gcs_policy(&mut self, _client: &dyn ApiClient) -> Result<()> {
        Ok(())
    }

    fn fetch_dataset_policy(&mut self, _client: &dyn ApiClient) -> Result<()> {
        Ok(())
    }

    fn fetch_cloudsql_policy(&mut self, _client: &dyn ApiClient) -> Result<()> {
        Ok(())
    }

    fn fetch_billing_info(&mut self, _client: &dyn ApiClient) -> Result<()> {
        Ok(())
    }

    fn fetch_enabled_apis(&mut self, _client: &dyn ApiClient) -> Result<()> {
        Ok(())
    }

    /// Enumerate child collections; an empty vec means a leaf
    fn list_children(&self, _client: &dyn ApiClient) -> Vec<ChildListing> {
        Vec::new()
    }

    /// Attach a warning (e.g. a child collection that could not be listed)
    fn add_warning(&mut self, warning: String);

    fn record(&self) -> ResourceRecord;

    fn fetch_facet(&mut self, facet: Facet, client: &dyn ApiClient) -> Result<()> {
        match facet {
            Facet::IamPolicy => self.fetch_iam_policy(client),
            Facet::GcsPolicy => self.fetch_gcs_policy(client),
            Facet::DatasetPolicy => self.fetch_dataset_policy(client),
            Facet::CloudSqlPolicy => self.fetch_cloudsql_policy(client),
            Facet::BillingInfo => self.fetch_billing_info(client),
            Facet::EnabledApis => self.fetch_enabled_apis(client),
        }
    }
}
