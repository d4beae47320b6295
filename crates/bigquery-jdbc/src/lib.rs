// SPDX-License-Identifier: Apache-2.0

//! Connection resolution and metadata caching for a BigQuery JDBC-style driver
//!
//! This crate turns a `jdbc:bigquery:` connection string plus caller-supplied
//! properties into one validated [`ConnectionConfig`], and keeps catalog
//! introspection results in a shared, TTL-bounded [`MetadataCache`].
//!
//! # Features
//!
//! - **Two URL dialects**: the path/query form (`jdbc:bigquery:proj/ds?k=v`) and
//!   the legacy Simba form (`jdbc:bigquery://host:443;ProjectId=proj;...`)
//! - **Property precedence**: overrides beat URL values, URL values beat defaults
//! - **Auth resolution**: one credential strategy per connection, validated up front
//! - **Metadata caching**: per-key TTL, lazy expiry, prefix invalidation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bigquery_jdbc::{AuthMode, CatalogCache, ConnectionConfig, MetadataCache, PropertyBag};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let overrides: PropertyBag = [("timeout", "120")].into_iter().collect();
//! let config = ConnectionConfig::from_url(
//!     "jdbc:bigquery://https://www.googleapis.com/bigquery/v2:443;ProjectId=proj;OAuthType=3;Timeout=60",
//!     &overrides,
//! )?;
//! assert_eq!(config.project_id(), "proj");
//! assert_eq!(config.timeout_secs(), 120);
//! assert_eq!(config.auth().mode(), AuthMode::ApplicationDefault);
//!
//! let shared = Arc::new(MetadataCache::default());
//! let catalog = CatalogCache::new(&config, shared);
//! assert!(catalog.is_enabled());
//! # Ok(())
//! # }
//! ```

pub use auth::{resolve_auth, AuthMode, AuthStrategy};
pub use cache::cursor::{MemoryCursor, RowCursor, TableData, Value};
pub use cache::{CacheStats, MetadataCache};
pub use catalog::CatalogCache;
pub use config::{ConnectionConfig, Endpoint, JobCreationMode, MetadataCacheConfig};
pub use dialect::{
    detect_dialect, parse_connection_string, translate_oauth_type, Dialect,
    ParsedConnectionString,
};
pub use error::{BigQueryError, BigQueryResult};
pub use properties::PropertyBag;
pub use storage::StorageApiMode;

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod dialect;
pub mod error;
pub mod properties;
pub mod storage;
