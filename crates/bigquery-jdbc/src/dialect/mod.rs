// SPDX-License-Identifier: Apache-2.0

//! Connection-string dialects
//!
//! Two grammars share the `jdbc:bigquery:` scheme:
//!
//! ```text
//! traditional  jdbc:bigquery:<project>[/<dataset>][?<key>=<value>{&<key>=<value>}]
//! legacy       jdbc:bigquery://<host>[:<port>];<Key>=<Value>{;<Key>=<Value>}[;]
//! ```
//!
//! Both are reduced to a project, an optional dataset and a flat property bag
//! keyed by canonical names. Override properties are applied last and always win.

mod legacy;
mod traditional;

use std::fmt;

use tracing::debug;

use crate::error::{BigQueryError, BigQueryResult};
use crate::properties::{keys, PropertyBag};

pub use legacy::translate_oauth_type;

/// Scheme prefix shared by both dialects
pub const SCHEME_PREFIX: &str = "jdbc:bigquery:";

/// Prefix that selects the legacy dialect once the scheme is stripped
const LEGACY_MARKER: &str = "//";

/// Connection-string grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Slash-delimited path with `&`-separated, percent-encoded query parameters
    Traditional,
    /// `host[:port]` followed by `;`-separated `Key=Value` pairs
    Legacy,
}

impl Dialect {
    /// Name of the project property in this dialect, used in error messages
    pub fn project_property(&self) -> &'static str {
        match self {
            Dialect::Traditional => keys::PROJECT_ID,
            Dialect::Legacy => legacy::PROJECT_ID,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Traditional => f.write_str("traditional"),
            Dialect::Legacy => f.write_str("legacy"),
        }
    }
}

/// Project, dataset and properties extracted from one dialect, before overrides
#[derive(Debug, Default)]
struct DialectParts {
    project_id: Option<String>,
    dataset_id: Option<String>,
    properties: PropertyBag,
}

/// Result of parsing a connection string and merging overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConnectionString {
    pub dialect: Dialect,
    pub project_id: String,
    pub dataset_id: Option<String>,
    pub properties: PropertyBag,
}

/// Detect the dialect of `url` without parsing the rest of it
pub fn detect_dialect(url: &str) -> BigQueryResult<Dialect> {
    let rest = strip_scheme(url)?;
    if rest.starts_with(LEGACY_MARKER) {
        Ok(Dialect::Legacy)
    } else {
        Ok(Dialect::Traditional)
    }
}

/// Parse `url` in whichever dialect it uses and apply `overrides` on top.
///
/// Overrides use canonical property names, including `projectId` and
/// `datasetId`, and take precedence over anything extracted from the string.
pub fn parse_connection_string(
    url: &str,
    overrides: &PropertyBag,
) -> BigQueryResult<ParsedConnectionString> {
    let rest = strip_scheme(url)?;

    let (dialect, parts) = match rest.strip_prefix(LEGACY_MARKER) {
        Some(rest) => (Dialect::Legacy, legacy::parse(rest)?),
        None => (Dialect::Traditional, traditional::parse(rest)?),
    };
    debug!(
        "Parsed {} connection string with {} properties",
        dialect,
        parts.properties.len()
    );

    let DialectParts {
        project_id,
        dataset_id,
        mut properties,
    } = parts;

    let mut overrides = overrides.clone();
    let override_project = overrides.remove(keys::PROJECT_ID);
    let override_dataset = overrides.remove(keys::DATASET_ID);
    properties.merge_overrides(&overrides);

    let project_id = override_project
        .or(project_id)
        .map(|project| project.trim().to_string())
        .filter(|project| !project.is_empty())
        .ok_or_else(|| {
            BigQueryError::missing(
                dialect.project_property(),
                format!("{} connection string", dialect),
            )
        })?;

    let dataset_id = override_dataset
        .or(dataset_id)
        .map(|dataset| dataset.trim().to_string())
        .filter(|dataset| !dataset.is_empty());

    Ok(ParsedConnectionString {
        dialect,
        project_id,
        dataset_id,
        properties,
    })
}

fn strip_scheme(url: &str) -> BigQueryResult<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(BigQueryError::MalformedConnectionString(
            "connection string is empty".to_string(),
        ));
    }
    url.strip_prefix(SCHEME_PREFIX).ok_or_else(|| {
        BigQueryError::MalformedConnectionString(format!(
            "expected '{}' prefix in '{}'",
            SCHEME_PREFIX, url
        ))
    })
}
