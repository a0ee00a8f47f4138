//! GCP resource hierarchy
//!
//! Organizations and folders contain folders and projects; projects contain
//! buckets, BigQuery datasets and Cloud SQL instances. Each kind knows which
//! facets apply to it and how to list its children.

use super::fetcher::{extract_str, list_all, list_pages, Paged};
use super::{ChildListing, Resource, ResourceKey, ResourceRecord};
use crate::gcp::client::{
    bigquery_url, billing_info_url, enabled_services_url, resourcemanager_url, sqladmin_url,
    storage_bucket_iam_url, storage_url, ApiClient,
};
use anyhow::{Context, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Organization,
    Folder,
    Project,
    Bucket,
    Dataset,
    CloudSqlInstance,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Folder => "folder",
            Self::Project => "project",
            Self::Bucket => "bucket",
            Self::Dataset => "dataset",
            Self::CloudSqlInstance => "cloudsqlinstance",
        }
    }

    /// Field holding the id in this kind's API representation
    fn id_field(&self) -> &'static str {
        match self {
            Self::Organization | Self::Folder => "name",
            Self::Project => "projectId",
            Self::Bucket => "name",
            Self::Dataset => "datasetReference.datasetId",
            Self::CloudSqlInstance => "name",
        }
    }
}

/// A GCP resource and the facets fetched for it so far
#[derive(Debug, Clone)]
pub struct GcpResource {
    kind: ResourceKind,
    id: String,
    record: ResourceRecord,
}

impl GcpResource {
    /// Build a resource from its API representation
    pub fn from_item(kind: ResourceKind, data: Value, parent: Option<ResourceKey>) -> Result<Self> {
        let raw_id = extract_str(&data, kind.id_field())
            .with_context(|| format!("{} is missing '{}'", kind.as_str(), kind.id_field()))?;

        // Resource Manager names are "organizations/123" / "folders/456"
        let id = match kind {
            ResourceKind::Organization | ResourceKind::Folder => raw_id
                .rsplit('/')
                .next()
                .unwrap_or(raw_id.as_str())
                .to_string(),
            _ => raw_id,
        };

        // Dataset and instance names are only unique within their project
        let owner_path = match kind {
            ResourceKind::Dataset => Some("datasetReference.projectId"),
            ResourceKind::CloudSqlInstance => Some("project"),
            _ => None,
        };
        let key_id = match owner_path.and_then(|path| extract_str(&data, path)) {
            Some(project) => format!("{}:{}", project, id),
            None => id.clone(),
        };

        let key = ResourceKey::new(kind.as_str(), key_id);
        Ok(Self {
            kind,
            id,
            record: ResourceRecord::new(key, parent, data),
        })
    }

    /// Resource Manager path for organizations, folders and projects
    fn resourcemanager_path(&self) -> Option<(&'static str, String)> {
        match self.kind {
            ResourceKind::Organization => Some(("v1", format!("organizations/{}", self.id))),
            ResourceKind::Folder => Some(("v2", format!("folders/{}", self.id))),
            ResourceKind::Project => Some(("v1", format!("projects/{}", self.id))),
            _ => None,
        }
    }

    fn list_folders(&self, client: &dyn ApiClient) -> Vec<ChildListing> {
        let parent = format!("{}s/{}", self.kind.as_str(), self.id);
        let url = resourcemanager_url(
            "v2",
            &format!("folders?parent={}", urlencoding::encode(&parent)),
        );
        self.child_listings(ResourceKind::Folder, list_pages(client, &url, "folders"))
    }

    fn list_projects(&self, client: &dyn ApiClient) -> Vec<ChildListing> {
        let filter = format!("parent.type:{} parent.id:{}", self.kind.as_str(), self.id);
        let url = resourcemanager_url(
            "v1",
            &format!("projects?filter={}", urlencoding::encode(&filter)),
        );
        let mut paged = list_pages(client, &url, "projects");

        // Projects pending deletion still show up in listings
        paged
            .items
            .retain(|p| p.get("lifecycleState").and_then(|v| v.as_str()) == Some("ACTIVE"));
        self.child_listings(ResourceKind::Project, paged)
    }

    fn list_project_children(
        &self,
        client: &dyn ApiClient,
        kind: ResourceKind,
        url: String,
        items_path: &str,
    ) -> Vec<ChildListing> {
        self.child_listings(kind, list_pages(client, &url, items_path))
    }

    /// Children from the pages that were fetched, then the fault that stopped
    /// the listing, if any
    fn child_listings(&self, kind: ResourceKind, paged: Paged) -> Vec<ChildListing> {
        let mut listings = Vec::new();
        if paged.error.is_none() || !paged.items.is_empty() {
            listings.push(Ok(self.children_from(kind, paged.items)));
        }
        if let Some(error) = paged.error {
            listings.push(Err(error.context(format!(
                "Failed to list {}s of {}",
                kind.as_str(),
                self.record.key
            ))));
        }
        listings
    }

    fn children_from(&self, kind: ResourceKind, items: Vec<Value>) -> Vec<Box<dyn Resource>> {
        items
            .into_iter()
            .filter_map(|item| {
                match GcpResource::from_item(kind, item, Some(self.record.key.clone())) {
                    Ok(child) => Some(Box::new(child) as Box<dyn Resource>),
                    Err(e) => {
                        tracing::warn!("Skipping malformed child of {}: {:#}", self.record.key, e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl Resource for GcpResource {
    fn key(&self) -> ResourceKey {
        self.record.key.clone()
    }

    fn fetch_iam_policy(&mut self, client: &dyn ApiClient) -> Result<()> {
        let Some((version, path)) = self.resourcemanager_path() else {
            return Ok(());
        };
        let url = resourcemanager_url(version, &format!("{}:getIamPolicy", path));
        let body = json!({"options": {"requestedPolicyVersion": 3}});
        self.record.iam_policy = Some(client.post(&url, &body)?);
        Ok(())
    }

    fn fetch_gcs_policy(&mut self, client: &dyn ApiClient) -> Result<()> {
        if self.kind != ResourceKind::Bucket {
            return Ok(());
        }
        self.record.gcs_policy = Some(client.get(&storage_bucket_iam_url(&self.id))?);
        Ok(())
    }

    fn fetch_dataset_policy(&mut self, client: &dyn ApiClient) -> Result<()> {
        if self.kind != ResourceKind::Dataset {
            return Ok(());
        }
        // Dataset listings omit the access list, it needs a full get
        let project = extract_str(&self.record.data, "datasetReference.projectId")
            .with_context(|| format!("{} is missing its project", self.record.key))?;
        let url = bigquery_url(&project, &format!("datasets/{}", self.id));
        let dataset = client.get(&url)?;
        self.record.dataset_policy = Some(dataset.get("access").cloned().unwrap_or(json!([])));
        Ok(())
    }

    fn fetch_cloudsql_policy(&mut self, _client: &dyn ApiClient) -> Result<()> {
        if self.kind != ResourceKind::CloudSqlInstance {
            return Ok(());
        }
        let ip_configuration = self
            .record
            .data
            .pointer("/settings/ipConfiguration")
            .cloned()
            .unwrap_or(Value::Null);
        self.record.cloudsql_policy = Some(ip_configuration);
        Ok(())
    }

    fn fetch_billing_info(&mut self, client: &dyn ApiClient) -> Result<()> {
        if self.kind != ResourceKind::Project {
            return Ok(());
        }
        self.record.billing_info = Some(client.get(&billing_info_url(&self.id))?);
        Ok(())
    }

    fn fetch_enabled_apis(&mut self, client: &dyn ApiClient) -> Result<()> {
        if self.kind != ResourceKind::Project {
            return Ok(());
        }
        let number = extract_str(&self.record.data, "projectNumber").unwrap_or_else(|| self.id.clone());
        let services = list_all(client, &enabled_services_url(&number), "services")?;
        let names = services
            .iter()
            .filter_map(|s| extract_str(s, "config.name").or_else(|| extract_str(s, "name")))
            .map(Value::String)
            .collect();
        self.record.enabled_apis = Some(Value::Array(names));
        Ok(())
    }

    fn list_children(&self, client: &dyn ApiClient) -> Vec<ChildListing> {
        match self.kind {
            ResourceKind::Organization | ResourceKind::Folder => {
                let mut listings = self.list_folders(client);
                listings.extend(self.list_projects(client));
                listings
            }
            ResourceKind::Project => {
                let project = &self.id;
                let mut listings = self.list_project_children(
                    client,
                    ResourceKind::Bucket,
                    storage_url(&format!("b?project={}", urlencoding::encode(project))),
                    "items",
                );
                listings.extend(self.list_project_children(
                    client,
                    ResourceKind::Dataset,
                    bigquery_url(project, "datasets"),
                    "datasets",
                ));
                listings.extend(self.list_project_children(
                    client,
                    ResourceKind::CloudSqlInstance,
                    sqladmin_url(project, "instances"),
                    "items",
                ));
                listings
            }
            ResourceKind::Bucket | ResourceKind::Dataset | ResourceKind::CloudSqlInstance => {
                Vec::new()
            }
        }
    }

    fn add_warning(&mut self, warning: String) {
        self.record.warnings.push(warning);
    }

    fn record(&self) -> ResourceRecord {
        self.record.clone()
    }
}

/// Resolve a root id such as `organizations/123`, `folders/456` or
/// `projects/my-project` into the root resource of a crawl
pub fn from_root_id(client: &dyn ApiClient, root_id: &str) -> Result<Box<dyn Resource>> {
    let (kind, version) = match root_id.split_once('/') {
        Some(("organizations", id)) if !id.is_empty() => (ResourceKind::Organization, "v1"),
        Some(("folders", id)) if !id.is_empty() => (ResourceKind::Folder, "v2"),
        Some(("projects", id)) if !id.is_empty() => (ResourceKind::Project, "v1"),
        _ => anyhow::bail!(
            "Unsupported root resource id '{}': expected organizations/<id>, folders/<id> or projects/<id>",
            root_id
        ),
    };

    let data = client
        .get(&resourcemanager_url(version, root_id))
        .with_context(|| format!("Failed to resolve root resource {}", root_id))?;

    tracing::info!("Resolved root resource {}", root_id);
    Ok(Box::new(GcpResource::from_item(kind, data, None)?))
}
