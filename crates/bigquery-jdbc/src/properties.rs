// SPDX-License-Identifier: Apache-2.0

//! Property bag produced by connection-string parsing and override merging.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};

use url::form_urlencoded;

/// Canonical property names accepted in the traditional dialect and in the
/// caller-supplied override bag.
pub mod keys {
    pub const PROJECT_ID: &str = "projectId";
    pub const DATASET_ID: &str = "datasetId";
    pub const DATASET_PROJECT_ID: &str = "datasetProjectId";

    pub const AUTH_TYPE: &str = "authType";
    pub const CREDENTIALS: &str = "credentials";
    pub const CLIENT_ID: &str = "clientId";
    pub const CLIENT_SECRET: &str = "clientSecret";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const CREDENTIAL_CONFIG_FILE: &str = "credentialConfigFile";

    pub const HOST: &str = "host";
    pub const PORT: &str = "port";

    pub const TIMEOUT: &str = "timeout";
    pub const MAX_RESULTS: &str = "maxResults";
    pub const USE_LEGACY_SQL: &str = "useLegacySql";
    pub const LOCATION: &str = "location";
    pub const LABELS: &str = "labels";
    pub const JOB_CREATION_MODE: &str = "jobCreationMode";
    pub const PAGE_SIZE: &str = "pageSize";
    pub const USE_STORAGE_API: &str = "useStorageApi";
    pub const ENABLE_SESSIONS: &str = "enableSessions";
    pub const CONNECTION_TIMEOUT: &str = "connectionTimeout";
    pub const RETRY_COUNT: &str = "retryCount";
    pub const MAX_BILLING_BYTES: &str = "maxBillingBytes";

    pub const METADATA_CACHE_TTL: &str = "metadataCacheTtl";
    pub const METADATA_CACHE_ENABLED: &str = "metadataCacheEnabled";
    pub const METADATA_LAZY_LOAD: &str = "metadataLazyLoad";
}

/// Flat string-keyed property map with case-insensitive keys.
///
/// Keys are folded to lowercase on insertion, so `pageSize`, `PAGESIZE` and
/// `pagesize` address the same entry. Inserting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    entries: BTreeMap<String, String>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property, returning the previous value
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(fold(key.as_ref()), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&fold(key)).map(String::as_str)
    }

    /// Look up a property, treating blank values as absent
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&fold(key))
    }

    /// Apply `overrides` on top of this bag; every override value wins
    pub fn merge_overrides(&mut self, overrides: &PropertyBag) {
        for (key, value) in overrides.iter() {
            self.entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(lowercase key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render the bag as form-encoded query parameters (`k=v&k2=v2`)
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.iter() {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

fn fold(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = PropertyBag::new();
        for (key, value) in iter {
            bag.insert(key, value);
        }
        bag
    }
}

impl From<HashMap<String, String>> for PropertyBag {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl IntoIterator for PropertyBag {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut bag = PropertyBag::new();
        bag.insert("PageSize", "100");
        assert_eq!(bag.get("pagesize"), Some("100"));
        assert_eq!(bag.get(keys::PAGE_SIZE), Some("100"));

        bag.insert("PAGESIZE", "200");
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get("pageSize"), Some("200"));
    }

    #[test]
    fn test_overrides_win() {
        let mut bag: PropertyBag = [("timeout", "60"), ("location", "US")].into_iter().collect();
        let overrides: PropertyBag = [("Timeout", "120")].into_iter().collect();

        bag.merge_overrides(&overrides);

        assert_eq!(bag.get("timeout"), Some("120"));
        assert_eq!(bag.get("location"), Some("US"));
    }

    #[test]
    fn test_blank_values() {
        let bag: PropertyBag = [("clientId", "  ")].into_iter().collect();
        assert_eq!(bag.get("clientId"), Some("  "));
        assert_eq!(bag.get_non_blank("clientId"), None);
    }

    #[test]
    fn test_query_string_encoding() {
        let bag: PropertyBag = [("labels", "team=data,env=prod"), ("location", "EU")]
            .into_iter()
            .collect();
        assert_eq!(
            bag.to_query_string(),
            "labels=team%3Ddata%2Cenv%3Dprod&location=EU"
        );
    }
}
