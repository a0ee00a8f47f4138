//! GCP API interaction module
//!
//! This module provides the core functionality for interacting with Google Cloud Platform
//! APIs: authentication, the HTTP client, and the blocking API handle the crawler uses.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client, the [`client::ApiClient`] trait and URL builders
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use gcp_inventory::gcp::client::{ApiClient, BlockingClient, GcpClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let handle = BlockingClient::new(client, tokio::runtime::Handle::current());
//!     tokio::task::spawn_blocking(move || handle.get("https://...")).await??;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
