//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality, plus the blocking [`ApiClient`] handle the
//! crawler hands to every resource it visits.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;
use tokio::runtime::Handle;

/// API surface the crawler passes, unchanged, to every resource fetch
///
/// Calls block the current thread. Crawler workers are plain OS threads,
/// so an implementation must never require an async context.
pub trait ApiClient: Send + Sync {
    /// GET a JSON document
    fn get(&self, url: &str) -> Result<Value>;

    /// POST a JSON body and return the JSON response
    fn post(&self, url: &str, body: &Value) -> Result<Value>;
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
}

impl GcpClient {
    /// Create a new GCP client
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        let http = GcpHttpClient::new()?;

        Ok(Self { credentials, http })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.post(url, &token, body).await
    }
}

/// Runs [`GcpClient`] requests to completion on a tokio runtime
///
/// Must be called from outside the runtime's own worker threads
/// (crawler workers, or a `spawn_blocking` thread).
#[derive(Clone)]
pub struct BlockingClient {
    client: GcpClient,
    runtime: Handle,
}

impl BlockingClient {
    pub fn new(client: GcpClient, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

impl ApiClient for BlockingClient {
    fn get(&self, url: &str) -> Result<Value> {
        self.runtime.block_on(self.client.get(url))
    }

    fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.runtime.block_on(self.client.post(url, Some(body)))
    }
}

// =========================================================================
// Resource Manager API helpers
// =========================================================================

/// Build Resource Manager API URL (`v1` for organizations/projects, `v2` for folders)
pub fn resourcemanager_url(version: &str, path: &str) -> String {
    format!("https://cloudresourcemanager.googleapis.com/{}/{}", version, path)
}

// =========================================================================
// Cloud Storage API helpers
// =========================================================================

/// Build Cloud Storage API URL
pub fn storage_url(path: &str) -> String {
    format!("https://storage.googleapis.com/storage/v1/{}", path)
}

/// Build Cloud Storage bucket IAM policy URL
pub fn storage_bucket_iam_url(bucket: &str) -> String {
    storage_url(&format!("b/{}/iam", urlencoding::encode(bucket)))
}

// =========================================================================
// BigQuery, Cloud SQL, Billing and Service Usage helpers
// =========================================================================

/// Build BigQuery API URL scoped to a project
pub fn bigquery_url(project_id: &str, path: &str) -> String {
    format!(
        "https://bigquery.googleapis.com/bigquery/v2/projects/{}/{}",
        project_id, path
    )
}

/// Build Cloud SQL Admin API URL scoped to a project
pub fn sqladmin_url(project_id: &str, path: &str) -> String {
    format!(
        "https://sqladmin.googleapis.com/v1/projects/{}/{}",
        project_id, path
    )
}

/// Build Cloud Billing URL for a project's billing info
pub fn billing_info_url(project_id: &str) -> String {
    format!(
        "https://cloudbilling.googleapis.com/v1/projects/{}/billingInfo",
        project_id
    )
}

/// Build Service Usage URL listing a project's enabled services
pub fn enabled_services_url(project_number: &str) -> String {
    format!(
        "https://serviceusage.googleapis.com/v1/projects/{}/services?filter={}",
        project_number,
        urlencoding::encode("state:ENABLED")
    )
}
