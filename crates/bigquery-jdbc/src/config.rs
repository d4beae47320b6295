// SPDX-License-Identifier: Apache-2.0

//! Resolved connection configuration
//!
//! [`ConnectionConfig::build`] turns a project, an optional dataset and the
//! merged property bag into an immutable, fully validated configuration. Every
//! typed option is parsed here; a missing option falls back to the default
//! function named after it. Any failure aborts the whole build.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{resolve_auth, AuthStrategy};
use crate::dialect::{parse_connection_string, ParsedConnectionString};
use crate::error::{BigQueryError, BigQueryResult};
use crate::properties::{keys, PropertyBag};
use crate::storage::StorageApiMode;

/// Whether queries may run without creating a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobCreationMode {
    /// Every query creates a job
    Required,
    /// Short queries may run through the job-less query path
    Optional,
}

impl fmt::Display for JobCreationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobCreationMode::Required => f.write_str("REQUIRED"),
            JobCreationMode::Optional => f.write_str("OPTIONAL"),
        }
    }
}

impl FromStr for JobCreationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let name = s
            .get(..13)
            .filter(|prefix| prefix.eq_ignore_ascii_case("JOB_CREATION_"))
            .map_or(s, |_| &s[13..]);
        if name.eq_ignore_ascii_case("REQUIRED") {
            Ok(JobCreationMode::Required)
        } else if name.eq_ignore_ascii_case("OPTIONAL") {
            Ok(JobCreationMode::Optional)
        } else {
            Err("expected REQUIRED or OPTIONAL".to_string())
        }
    }
}

/// Endpoint override for non-production targets such as an emulator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Metadata cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataCacheConfig {
    /// Enable metadata caching
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Time-to-live for cache entries in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    /// Defer catalog introspection until it is first needed
    #[serde(default)]
    pub lazy_load: bool,
}

impl Default for MetadataCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_seconds: default_cache_ttl(),
            lazy_load: false,
        }
    }
}

impl MetadataCacheConfig {
    /// Get TTL as Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Immutable, validated configuration for one logical connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    project_id: String,
    dataset_id: Option<String>,
    dataset_project_id: String,
    auth: AuthStrategy,
    endpoint: Option<Endpoint>,
    timeout_secs: u64,
    max_results: Option<u64>,
    use_legacy_sql: bool,
    location: Option<String>,
    labels: BTreeMap<String, String>,
    job_creation_mode: JobCreationMode,
    page_size: u32,
    use_storage_api: StorageApiMode,
    enable_sessions: bool,
    connection_timeout_secs: u64,
    retry_count: u32,
    max_billing_bytes: Option<i64>,
    metadata_cache_ttl_secs: Option<u64>,
    metadata_cache_enabled: Option<bool>,
    metadata_lazy_load: Option<bool>,
}

impl ConnectionConfig {
    /// Parse a connection string in either dialect, apply `overrides` and build
    pub fn from_url(url: &str, overrides: &PropertyBag) -> BigQueryResult<Self> {
        let parsed = parse_connection_string(url, overrides)?;
        Self::from_parsed(&parsed)
    }

    pub fn from_parsed(parsed: &ParsedConnectionString) -> BigQueryResult<Self> {
        Self::build(
            &parsed.project_id,
            parsed.dataset_id.as_deref(),
            &parsed.properties,
        )
    }

    /// Build a configuration from an already merged property bag
    pub fn build(
        project_id: &str,
        dataset_id: Option<&str>,
        properties: &PropertyBag,
    ) -> BigQueryResult<Self> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(BigQueryError::missing(keys::PROJECT_ID, "connection configuration"));
        }
        let dataset_id = dataset_id
            .map(str::trim)
            .filter(|dataset| !dataset.is_empty())
            .map(str::to_string);

        let endpoint = parse_endpoint(properties)?;
        let auth = resolve_auth(properties.get(keys::AUTH_TYPE), properties)?;

        let config = Self {
            project_id: project_id.to_string(),
            dataset_id,
            dataset_project_id: string_property(properties, keys::DATASET_PROJECT_ID)
                .unwrap_or_else(|| project_id.to_string()),
            auth,
            endpoint,
            timeout_secs: parse_property(properties, keys::TIMEOUT)?
                .unwrap_or_else(default_timeout),
            max_results: parse_positive(properties, keys::MAX_RESULTS)?,
            use_legacy_sql: parse_bool(properties, keys::USE_LEGACY_SQL)?.unwrap_or(false),
            location: string_property(properties, keys::LOCATION),
            labels: properties
                .get(keys::LABELS)
                .map(parse_labels)
                .unwrap_or_default(),
            job_creation_mode: parse_property(properties, keys::JOB_CREATION_MODE)?
                .unwrap_or(JobCreationMode::Required),
            page_size: parse_positive(properties, keys::PAGE_SIZE)?
                .unwrap_or_else(default_page_size),
            use_storage_api: parse_property(properties, keys::USE_STORAGE_API)?
                .unwrap_or_default(),
            enable_sessions: parse_bool(properties, keys::ENABLE_SESSIONS)?.unwrap_or(false),
            connection_timeout_secs: parse_property(properties, keys::CONNECTION_TIMEOUT)?
                .unwrap_or_else(default_connection_timeout),
            retry_count: parse_property(properties, keys::RETRY_COUNT)?
                .unwrap_or_else(default_retry_count),
            max_billing_bytes: parse_positive(properties, keys::MAX_BILLING_BYTES)?,
            metadata_cache_ttl_secs: parse_property(properties, keys::METADATA_CACHE_TTL)?,
            metadata_cache_enabled: parse_bool(properties, keys::METADATA_CACHE_ENABLED)?,
            metadata_lazy_load: parse_bool(properties, keys::METADATA_LAZY_LOAD)?,
        };

        info!(
            "Resolved connection configuration for project {} (auth: {}, endpoint: {})",
            config.project_id,
            config.auth.mode(),
            config
                .endpoint
                .as_ref()
                .map_or_else(|| "default".to_string(), Endpoint::to_string)
        );

        Ok(config)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset_id.as_deref()
    }

    /// Project owning the default dataset; the connection project unless overridden
    pub fn dataset_project_id(&self) -> &str {
        &self.dataset_project_id
    }

    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Get query timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_results(&self) -> Option<u64> {
        self.max_results
    }

    pub fn use_legacy_sql(&self) -> bool {
        self.use_legacy_sql
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn job_creation_mode(&self) -> JobCreationMode {
        self.job_creation_mode
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn use_storage_api(&self) -> StorageApiMode {
        self.use_storage_api
    }

    /// Decide whether a result of `result_bytes` is read through the Storage API
    pub fn reads_with_storage_api(&self, result_bytes: u64) -> bool {
        self.use_storage_api.should_use(result_bytes)
    }

    pub fn enable_sessions(&self) -> bool {
        self.enable_sessions
    }

    pub fn connection_timeout_secs(&self) -> u64 {
        self.connection_timeout_secs
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_billing_bytes(&self) -> Option<i64> {
        self.max_billing_bytes
    }

    /// Per-connection cache TTL override
    pub fn metadata_cache_ttl(&self) -> Option<Duration> {
        self.metadata_cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn metadata_cache_enabled(&self) -> Option<bool> {
        self.metadata_cache_enabled
    }

    pub fn metadata_lazy_load(&self) -> Option<bool> {
        self.metadata_lazy_load
    }

    /// Apply this connection's cache overrides on top of `base`
    pub fn metadata_cache_config(&self, base: &MetadataCacheConfig) -> MetadataCacheConfig {
        MetadataCacheConfig {
            enabled: self.metadata_cache_enabled.unwrap_or(base.enabled),
            ttl_seconds: self.metadata_cache_ttl_secs.unwrap_or(base.ttl_seconds),
            lazy_load: self.metadata_lazy_load.unwrap_or(base.lazy_load),
        }
    }
}

/// Split `k=v,k2=v2` into a map; entries without `=` or with an empty key are skipped
pub fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn parse_endpoint(properties: &PropertyBag) -> BigQueryResult<Option<Endpoint>> {
    let port: Option<u16> = parse_property(properties, keys::PORT)?;
    match string_property(properties, keys::HOST) {
        Some(host) => Ok(Some(Endpoint { host, port })),
        None if port.is_some() => Err(BigQueryError::missing(keys::HOST, "port override")),
        None => Ok(None),
    }
}

fn string_property(properties: &PropertyBag, key: &str) -> Option<String> {
    properties.get_non_blank(key).map(|value| value.trim().to_string())
}

/// Parse an optional typed property; blank values count as absent
fn parse_property<T>(properties: &PropertyBag, key: &str) -> BigQueryResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match properties.get_non_blank(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BigQueryError::invalid(key, raw, e)),
        None => Ok(None),
    }
}

fn parse_positive<T>(properties: &PropertyBag, key: &str) -> BigQueryResult<Option<T>>
where
    T: FromStr + Default + PartialOrd,
    T::Err: fmt::Display,
{
    match parse_property::<T>(properties, key)? {
        Some(value) if value <= T::default() => Err(BigQueryError::invalid(
            key,
            properties.get(key).unwrap_or_default(),
            "must be greater than zero",
        )),
        value => Ok(value),
    }
}

fn parse_bool(properties: &PropertyBag, key: &str) -> BigQueryResult<Option<bool>> {
    match properties.get_non_blank(key).map(str::trim) {
        Some(raw) if raw.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(raw) if raw.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(raw) => Err(BigQueryError::invalid(key, raw, "expected true or false")),
        None => Ok(None),
    }
}

// Default value functions for connection options
fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_page_size() -> u32 {
    10_000
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

// Default value functions for the metadata cache
fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::STORAGE_API_THRESHOLD_BYTES;

    fn bag(pairs: &[(&str, &str)]) -> PropertyBag {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::build("my-project", None, &PropertyBag::new()).unwrap();

        assert_eq!(config.project_id(), "my-project");
        assert_eq!(config.dataset_id(), None);
        assert_eq!(config.dataset_project_id(), "my-project");
        assert_eq!(config.auth(), &AuthStrategy::ApplicationDefault);
        assert_eq!(config.endpoint(), None);
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.max_results(), None);
        assert!(!config.use_legacy_sql());
        assert_eq!(config.location(), None);
        assert!(config.labels().is_empty());
        assert_eq!(config.job_creation_mode(), JobCreationMode::Required);
        assert_eq!(config.page_size(), 10_000);
        assert_eq!(config.use_storage_api(), StorageApiMode::Auto);
        assert_eq!(config.use_storage_api().to_string(), "auto");
        assert!(!config.enable_sessions());
        assert_eq!(config.connection_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_count(), 3);
        assert_eq!(config.max_billing_bytes(), None);
        assert_eq!(config.metadata_cache_ttl(), None);
        assert_eq!(config.metadata_cache_enabled(), None);
        assert_eq!(config.metadata_lazy_load(), None);
    }

    #[test]
    fn test_typed_options() {
        let props = bag(&[
            ("timeout", "120"),
            ("maxResults", "1000"),
            ("useLegacySql", "TRUE"),
            ("location", " asia-northeast1 "),
            ("labels", "team=data, env = prod ,broken, =nokey"),
            ("jobCreationMode", "optional"),
            ("pageSize", "500"),
            ("useStorageApi", "false"),
            ("enableSessions", "true"),
            ("connectionTimeout", "10"),
            ("retryCount", "0"),
            ("maxBillingBytes", "1073741824"),
            ("datasetProjectId", "shared-data"),
            ("metadataCacheTtl", "60"),
            ("metadataCacheEnabled", "false"),
            ("metadataLazyLoad", "true"),
        ]);
        let config = ConnectionConfig::build("p", Some("ds"), &props).unwrap();

        assert_eq!(config.timeout_secs(), 120);
        assert_eq!(config.max_results(), Some(1000));
        assert!(config.use_legacy_sql());
        assert_eq!(config.location(), Some("asia-northeast1"));
        assert_eq!(config.labels().len(), 2);
        assert_eq!(config.labels()["team"], "data");
        assert_eq!(config.labels()["env"], "prod");
        assert_eq!(config.job_creation_mode(), JobCreationMode::Optional);
        assert_eq!(config.page_size(), 500);
        assert_eq!(config.use_storage_api(), StorageApiMode::False);
        assert!(config.enable_sessions());
        assert_eq!(config.connection_timeout_secs(), 10);
        assert_eq!(config.retry_count(), 0);
        assert_eq!(config.max_billing_bytes(), Some(1_073_741_824));
        assert_eq!(config.dataset_id(), Some("ds"));
        assert_eq!(config.dataset_project_id(), "shared-data");
        assert_eq!(config.metadata_cache_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.metadata_cache_enabled(), Some(false));
        assert_eq!(config.metadata_lazy_load(), Some(true));
    }

    #[test]
    fn test_reads_with_storage_api() {
        let auto = ConnectionConfig::build("p", None, &bag(&[])).unwrap();
        assert!(!auto.reads_with_storage_api(STORAGE_API_THRESHOLD_BYTES));
        assert!(auto.reads_with_storage_api(STORAGE_API_THRESHOLD_BYTES + 1));

        let forced = ConnectionConfig::build("p", None, &bag(&[("useStorageApi", "TRUE")])).unwrap();
        assert!(forced.reads_with_storage_api(0));
    }

    #[test]
    fn test_invalid_values_name_property_and_literal() {
        let cases = [
            ("timeout", "ten"),
            ("timeout", "-5"),
            ("pageSize", "0"),
            ("maxResults", "many"),
            ("useLegacySql", "yes"),
            ("jobCreationMode", "SOMETIMES"),
            ("useStorageApi", "maybe"),
            ("retryCount", "1.5"),
            ("maxBillingBytes", "99999999999999999999"),
            ("port", "70000"),
        ];
        for (key, value) in cases {
            let props = bag(&[("host", "localhost"), (key, value)]);
            let err = ConnectionConfig::build("p", None, &props).unwrap_err();
            match &err {
                BigQueryError::InvalidPropertyValue {
                    property,
                    value: literal,
                    ..
                } => {
                    assert_eq!(property, key);
                    assert_eq!(literal, value);
                }
                other => panic!("{key}={value}: unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_project_rejected() {
        let err = ConnectionConfig::build("  ", None, &PropertyBag::new()).unwrap_err();
        assert_eq!(err.property(), Some("projectId"));
    }

    #[test]
    fn test_auth_failure_aborts_build() {
        let props = bag(&[("authType", "SERVICE_ACCOUNT")]);
        let err = ConnectionConfig::build("p", None, &props).unwrap_err();
        assert_eq!(err.property(), Some("credentials"));

        let props = bag(&[("authType", "LDAP")]);
        let err = ConnectionConfig::build("p", None, &props).unwrap_err();
        assert_eq!(err, BigQueryError::UnsupportedAuthMode("LDAP".to_string()));
    }

    #[test]
    fn test_endpoint_implies_emulator() {
        let props = bag(&[("host", "localhost"), ("port", "9050")]);
        let config = ConnectionConfig::build("p", None, &props).unwrap();
        assert_eq!(config.auth(), &AuthStrategy::Emulator);
        assert_eq!(
            config.endpoint(),
            Some(&Endpoint {
                host: "localhost".to_string(),
                port: Some(9050),
            })
        );
        assert_eq!(config.endpoint().unwrap().to_string(), "localhost:9050");

        let err = ConnectionConfig::build("p", None, &bag(&[("port", "9050")])).unwrap_err();
        assert_eq!(err.property(), Some("host"));
    }

    #[test]
    fn test_structural_equality() {
        let props = bag(&[("labels", "a=1,b=2"), ("timeout", "60")]);
        let a = ConnectionConfig::build("p", Some("d"), &props).unwrap();
        let b = ConnectionConfig::build("p", Some("d"), &props).unwrap();
        assert_eq!(a, b);

        let c = ConnectionConfig::build("p", Some("other"), &props).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels("a=1,b = 2,c,=x,d=");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["a"], "1");
        assert_eq!(labels["b"], "2");
        assert_eq!(labels["d"], "");
        assert!(parse_labels("").is_empty());
    }

    #[test]
    fn test_job_creation_mode_parse() {
        assert_eq!(
            "JOB_CREATION_OPTIONAL".parse::<JobCreationMode>().unwrap(),
            JobCreationMode::Optional
        );
        assert_eq!(
            "required".parse::<JobCreationMode>().unwrap(),
            JobCreationMode::Required
        );
        assert!("".parse::<JobCreationMode>().is_err());
    }

    #[test]
    fn test_cache_config_overrides() {
        let base = MetadataCacheConfig::default();
        assert!(base.enabled);
        assert_eq!(base.ttl(), Duration::from_secs(300));
        assert!(!base.lazy_load);

        let props = bag(&[("metadataCacheTtl", "30"), ("metadataLazyLoad", "true")]);
        let config = ConnectionConfig::build("p", None, &props).unwrap();
        let effective = config.metadata_cache_config(&base);
        assert!(effective.enabled);
        assert_eq!(effective.ttl(), Duration::from_secs(30));
        assert!(effective.lazy_load);
    }

    #[test]
    fn test_cache_config_deserialize_defaults() {
        let config: MetadataCacheConfig = serde_json::from_str(r#"{"ttl_seconds": 45}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.ttl_seconds, 45);
        assert!(!config.lazy_load);
    }
}
