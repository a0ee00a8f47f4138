//! Resource Fetcher
//!
//! Paginated list calls against GCP REST APIs.

use crate::gcp::client::ApiClient;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Items gathered by a paginated list call, and the fault that cut it short
#[derive(Debug, Default)]
pub struct Paged {
    pub items: Vec<Value>,
    pub error: Option<anyhow::Error>,
}

impl Paged {
    /// All items, or the fault if any page failed
    pub fn into_result(self) -> Result<Vec<Value>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.items),
        }
    }
}

/// Fetch every page of a list call (auto-paginate on `nextPageToken`)
///
/// Items from pages fetched before a failing page are kept.
pub fn list_pages(client: &dyn ApiClient, url: &str, items_path: &str) -> Paged {
    let mut items = Vec::new();
    let error = fetch_pages(client, url, items_path, &mut items).err();
    Paged { items, error }
}

/// Like [`list_pages`], but any failing page fails the whole listing
pub fn list_all(client: &dyn ApiClient, url: &str, items_path: &str) -> Result<Vec<Value>> {
    list_pages(client, url, items_path).into_result()
}

fn fetch_pages(
    client: &dyn ApiClient,
    url: &str,
    items_path: &str,
    items: &mut Vec<Value>,
) -> Result<()> {
    let mut seen_tokens = HashSet::new();
    let mut page_token: Option<String> = None;

    loop {
        let page_url = with_page_token(url, page_token.as_deref())?;
        let response = client.get(&page_url)?;
        items.extend(extract_items(&response, items_path));

        let next_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|token| !token.is_empty())
            .map(|s| s.to_string());

        let Some(token) = next_token else {
            return Ok(());
        };
        if !seen_tokens.insert(token.clone()) {
            anyhow::bail!("API returned page token '{}' twice for {}", token, url);
        }
        page_token = Some(token);
    }
}

fn with_page_token(url: &str, page_token: Option<&str>) -> Result<String> {
    let Some(token) = page_token else {
        return Ok(url.to_string());
    };

    let mut parsed = Url::parse(url).with_context(|| format!("Invalid API URL: {}", url))?;
    parsed.query_pairs_mut().append_pair("pageToken", token);
    Ok(parsed.into())
}

/// Extract the item array at a dot-notation path (an empty path means the response itself)
pub fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    let target = if path.is_empty() {
        Some(response)
    } else {
        path.split('.').try_fold(response, |current, part| current.get(part))
    };

    target
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Extract a string at a dot-notation path; numeric ids are rendered as strings
pub fn extract_str(item: &Value, path: &str) -> Option<String> {
    let value = path.split('.').try_fold(item, |current, part| {
        match part.parse::<usize>() {
            Ok(idx) => current.get(idx),
            Err(_) => current.get(part),
        }
    })?;

    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
