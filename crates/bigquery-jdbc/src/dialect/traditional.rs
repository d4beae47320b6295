// SPDX-License-Identifier: Apache-2.0

//! Traditional dialect: `<project>[/<dataset>][?<key>=<value>{&<key>=<value>}]`

use url::form_urlencoded;

use super::DialectParts;
use crate::error::{BigQueryError, BigQueryResult};
use crate::properties::{keys, PropertyBag};

/// Parse everything after the `jdbc:bigquery:` prefix.
///
/// Identity in the path wins over `projectId`/`datasetId` query parameters.
pub(super) fn parse(rest: &str) -> BigQueryResult<DialectParts> {
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut properties = match query {
        Some(query) => parse_query(query),
        None => PropertyBag::new(),
    };
    let query_project = properties.remove(keys::PROJECT_ID);
    let query_dataset = properties.remove(keys::DATASET_ID);

    let (path_project, path_dataset) = parse_path(path)?;

    Ok(DialectParts {
        project_id: path_project.or(query_project),
        dataset_id: path_dataset.or(query_dataset),
        properties,
    })
}

fn parse_path(path: &str) -> BigQueryResult<(Option<String>, Option<String>)> {
    let path = path.trim().trim_end_matches('/');
    if path.is_empty() {
        return Ok((None, None));
    }

    let segments: Vec<&str> = path.split('/').map(str::trim).collect();
    if segments.len() > 2 || segments.iter().any(|segment| segment.is_empty()) {
        return Err(BigQueryError::MalformedConnectionString(format!(
            "expected '<project>[/<dataset>]' but found '{}'",
            path
        )));
    }

    let project = segments[0].to_string();
    let dataset = segments.get(1).map(|dataset| dataset.to_string());
    Ok((Some(project), dataset))
}

/// Split on `&` and the first `=` of each pair, percent-decoding both sides.
/// Pairs with an empty key are skipped; a later duplicate replaces an earlier one.
fn parse_query(query: &str) -> PropertyBag {
    let query = query.trim_end_matches('&');
    form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
