// SPDX-License-Identifier: Apache-2.0

//! Legacy dialect: `<host>[:<port>];<Key>=<Value>{;<Key>=<Value>}[;]`
//!
//! Keys are matched case-sensitively against a fixed remap table and renamed
//! to their canonical equivalents. Unknown keys are dropped so that strings
//! written for newer driver releases still connect. Values are taken verbatim
//! apart from surrounding whitespace; there is no percent-decoding.

use tracing::debug;

use super::DialectParts;
use crate::auth::AuthMode;
use crate::error::{BigQueryError, BigQueryResult};
use crate::properties::keys;

pub(super) const PROJECT_ID: &str = "ProjectId";
const DEFAULT_DATASET: &str = "DefaultDataset";
const OAUTH_TYPE: &str = "OAuthType";
const OAUTH_PVT_KEY_PATH: &str = "OAuthPvtKeyPath";

/// Domain of the public API endpoint; hosts on it are not endpoint overrides
const PUBLIC_ENDPOINT_DOMAIN: &str = "googleapis.com";

/// Canonical name for each legacy key that maps one-to-one onto a property
fn canonical_key(legacy_key: &str) -> Option<&'static str> {
    let canonical = match legacy_key {
        OAUTH_PVT_KEY_PATH => keys::CREDENTIALS,
        "OAuthClientId" => keys::CLIENT_ID,
        "OAuthClientSecret" => keys::CLIENT_SECRET,
        "OAuthRefreshToken" => keys::REFRESH_TOKEN,
        "Timeout" => keys::TIMEOUT,
        "MaxResults" => keys::MAX_RESULTS,
        "UseLegacySQL" => keys::USE_LEGACY_SQL,
        "Location" => keys::LOCATION,
        "DatasetProjectId" => keys::DATASET_PROJECT_ID,
        _ => return None,
    };
    Some(canonical)
}

/// Translate a numeric `OAuthType` code into the canonical mode.
///
/// | code | mode                  |
/// |------|-----------------------|
/// | 0    | `SERVICE_ACCOUNT`     |
/// | 1    | `USER_OAUTH`          |
/// | 2    | rejected              |
/// | 3    | `APPLICATION_DEFAULT` |
/// | 4    | `WORKLOAD_IDENTITY`   |
pub fn translate_oauth_type(code: &str) -> BigQueryResult<AuthMode> {
    let code = code.trim();
    match code {
        "0" => Ok(AuthMode::ServiceAccount),
        "1" => Ok(AuthMode::UserOAuth),
        "2" => Err(BigQueryError::UnsupportedLegacyAuthCode {
            code: code.to_string(),
            reason: "pre-generated access tokens are not supported; use OAuthType=0, 1, 3 or 4"
                .to_string(),
        }),
        "3" => Ok(AuthMode::ApplicationDefault),
        "4" => Ok(AuthMode::WorkloadIdentity),
        other => Err(BigQueryError::invalid(
            OAUTH_TYPE,
            other,
            "expected one of 0, 1, 3, 4",
        )),
    }
}

/// Parse everything after the `jdbc:bigquery://` prefix.
pub(super) fn parse(rest: &str) -> BigQueryResult<DialectParts> {
    let rest = rest.trim().trim_end_matches(';');
    let mut segments = rest.split(';');

    let host_segment = segments.next().unwrap_or_default().trim();
    if host_segment.is_empty() {
        return Err(BigQueryError::MalformedConnectionString(
            "expected '<host>[:<port>]' after 'jdbc:bigquery://'".to_string(),
        ));
    }

    let mut parts = DialectParts::default();
    let (host, port) = split_host_port(host_segment);
    if !is_public_endpoint(host) {
        parts.properties.insert(keys::HOST, host);
        if let Some(port) = port {
            parts.properties.insert(keys::PORT, port);
        }
    }

    for segment in segments.map(str::trim).filter(|segment| !segment.is_empty()) {
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            BigQueryError::MalformedConnectionString(format!(
                "expected '<Key>=<Value>' but found '{}'",
                segment
            ))
        })?;
        let (key, value) = (key.trim(), value.trim());

        match key {
            PROJECT_ID => parts.project_id = Some(value.to_string()),
            DEFAULT_DATASET => parts.dataset_id = Some(value.to_string()),
            OAUTH_TYPE => {
                let mode = translate_oauth_type(value)?;
                parts.properties.insert(keys::AUTH_TYPE, mode.as_str());
            }
            _ => match canonical_key(key) {
                Some(canonical) => {
                    parts.properties.insert(canonical, value);
                }
                None => debug!("Ignoring unrecognized legacy property: {}", key),
            },
        }
    }

    // External-account connections carry their configuration file in the key path
    if parts.properties.get(keys::AUTH_TYPE) == Some(AuthMode::WorkloadIdentity.as_str())
        && !parts.properties.contains_key(keys::CREDENTIAL_CONFIG_FILE)
    {
        if let Some(path) = parts.properties.get(keys::CREDENTIALS).map(str::to_string) {
            parts.properties.insert(keys::CREDENTIAL_CONFIG_FILE, path);
        }
    }

    Ok(parts)
}

/// Check whether `host` (possibly `scheme://host[:port]/path`) names the public endpoint
fn is_public_endpoint(host: &str) -> bool {
    let host = host.split_once("://").map_or(host, |(_, rest)| rest);
    let host = host.split(|c: char| c == '/' || c == ':').next().unwrap_or_default();
    let host = host.to_ascii_lowercase();
    host == PUBLIC_ENDPOINT_DOMAIN
        || host
            .strip_suffix(PUBLIC_ENDPOINT_DOMAIN)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Split `host[:port]`, treating the suffix as a port only when it is numeric
fn split_host_port(segment: &str) -> (&str, Option<&str>) {
    match segment.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty() && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            (host, Some(port))
        }
        _ => (segment, None),
    }
}
