// SPDX-License-Identifier: Apache-2.0

//! Authentication strategy resolution
//!
//! This module maps an authentication mode token plus the property bag onto one
//! of the supported credential-acquisition strategies:
//! - Application default credentials
//! - Service account key file
//! - User OAuth (client id, client secret, refresh token)
//! - Workforce identity federation
//! - Workload identity federation
//! - Emulator (no credentials)
//!
//! Required fields are validated when the strategy is constructed. Acquiring the
//! actual credential happens later, outside this crate.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{BigQueryError, BigQueryResult};
use crate::properties::{keys, PropertyBag};

/// Authentication mode names as they appear in `authType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    ApplicationDefault,
    ServiceAccount,
    UserOAuth,
    WorkforceIdentity,
    WorkloadIdentity,
    Emulator,
}

impl AuthMode {
    pub const ALL: [AuthMode; 6] = [
        AuthMode::ApplicationDefault,
        AuthMode::ServiceAccount,
        AuthMode::UserOAuth,
        AuthMode::WorkforceIdentity,
        AuthMode::WorkloadIdentity,
        AuthMode::Emulator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::ApplicationDefault => "APPLICATION_DEFAULT",
            AuthMode::ServiceAccount => "SERVICE_ACCOUNT",
            AuthMode::UserOAuth => "USER_OAUTH",
            AuthMode::WorkforceIdentity => "WORKFORCE_IDENTITY",
            AuthMode::WorkloadIdentity => "WORKLOAD_IDENTITY",
            AuthMode::Emulator => "EMULATOR",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = BigQueryError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        AuthMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| BigQueryError::UnsupportedAuthMode(token.to_string()))
    }
}

/// Service account key file location
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccountKey {
    key_path: String,
}

impl ServiceAccountKey {
    pub fn new(key_path: impl Into<String>) -> BigQueryResult<Self> {
        Ok(Self {
            key_path: required(key_path.into(), keys::CREDENTIALS, AuthMode::ServiceAccount)?,
        })
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }
}

/// User OAuth client registration plus a long-lived refresh token
#[derive(Clone, PartialEq, Eq)]
pub struct UserOAuthCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl UserOAuthCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> BigQueryResult<Self> {
        Ok(Self {
            client_id: required(client_id.into(), keys::CLIENT_ID, AuthMode::UserOAuth)?,
            client_secret: required(client_secret.into(), keys::CLIENT_SECRET, AuthMode::UserOAuth)?,
            refresh_token: required(refresh_token.into(), keys::REFRESH_TOKEN, AuthMode::UserOAuth)?,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

/// Identity federation credential configuration file (workforce or workload)
#[derive(Clone, PartialEq, Eq)]
pub struct ExternalAccountConfig {
    credential_config_file: String,
}

impl ExternalAccountConfig {
    fn new(credential_config_file: String, mode: AuthMode) -> BigQueryResult<Self> {
        Ok(Self {
            credential_config_file: required(
                credential_config_file,
                keys::CREDENTIAL_CONFIG_FILE,
                mode,
            )?,
        })
    }

    pub fn credential_config_file(&self) -> &str {
        &self.credential_config_file
    }
}

/// Resolved, validated credential-acquisition approach for a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Ambient credentials from the environment
    ApplicationDefault,

    /// Service account key file
    ServiceAccount(ServiceAccountKey),

    /// User OAuth refresh-token flow
    UserOAuth(UserOAuthCredentials),

    /// Workforce identity federation
    WorkforceIdentity(ExternalAccountConfig),

    /// Workload identity federation
    WorkloadIdentity(ExternalAccountConfig),

    /// Local emulator, no credentials
    Emulator,
}

impl AuthStrategy {
    pub fn service_account(key_path: impl Into<String>) -> BigQueryResult<Self> {
        ServiceAccountKey::new(key_path).map(AuthStrategy::ServiceAccount)
    }

    pub fn user_oauth(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> BigQueryResult<Self> {
        UserOAuthCredentials::new(client_id, client_secret, refresh_token)
            .map(AuthStrategy::UserOAuth)
    }

    pub fn workforce_identity(credential_config_file: impl Into<String>) -> BigQueryResult<Self> {
        ExternalAccountConfig::new(credential_config_file.into(), AuthMode::WorkforceIdentity)
            .map(AuthStrategy::WorkforceIdentity)
    }

    pub fn workload_identity(credential_config_file: impl Into<String>) -> BigQueryResult<Self> {
        ExternalAccountConfig::new(credential_config_file.into(), AuthMode::WorkloadIdentity)
            .map(AuthStrategy::WorkloadIdentity)
    }

    /// Get the mode this strategy was resolved from
    pub fn mode(&self) -> AuthMode {
        match self {
            AuthStrategy::ApplicationDefault => AuthMode::ApplicationDefault,
            AuthStrategy::ServiceAccount(_) => AuthMode::ServiceAccount,
            AuthStrategy::UserOAuth(_) => AuthMode::UserOAuth,
            AuthStrategy::WorkforceIdentity(_) => AuthMode::WorkforceIdentity,
            AuthStrategy::WorkloadIdentity(_) => AuthMode::WorkloadIdentity,
            AuthStrategy::Emulator => AuthMode::Emulator,
        }
    }

    /// Get the file the strategy reads its credential from, if any
    pub fn credential_file(&self) -> Option<&str> {
        match self {
            AuthStrategy::ServiceAccount(key) => Some(key.key_path()),
            AuthStrategy::WorkforceIdentity(config) | AuthStrategy::WorkloadIdentity(config) => {
                Some(config.credential_config_file())
            }
            AuthStrategy::ApplicationDefault
            | AuthStrategy::UserOAuth(_)
            | AuthStrategy::Emulator => None,
        }
    }

    /// Check whether the connection sends credentials at all
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthStrategy::Emulator)
    }
}

/// Pick the mode used when `authType` is absent
pub fn default_auth_mode(properties: &PropertyBag) -> AuthMode {
    if properties.get_non_blank(keys::HOST).is_some() {
        AuthMode::Emulator
    } else {
        AuthMode::ApplicationDefault
    }
}

/// Resolve an authentication strategy from a mode token and the property bag.
///
/// With no token (or a blank one) the mode defaults to `EMULATOR` when a host
/// override is present and `APPLICATION_DEFAULT` otherwise.
pub fn resolve_auth(auth_mode: Option<&str>, properties: &PropertyBag) -> BigQueryResult<AuthStrategy> {
    let mode = match auth_mode.map(str::trim).filter(|token| !token.is_empty()) {
        Some(token) => token.parse::<AuthMode>()?,
        None => default_auth_mode(properties),
    };
    debug!("Resolving authentication strategy: {}", mode);

    let field = |key: &str| properties.get(key).unwrap_or_default().to_string();

    match mode {
        AuthMode::ApplicationDefault => Ok(AuthStrategy::ApplicationDefault),
        AuthMode::ServiceAccount => AuthStrategy::service_account(field(keys::CREDENTIALS)),
        AuthMode::UserOAuth => AuthStrategy::user_oauth(
            field(keys::CLIENT_ID),
            field(keys::CLIENT_SECRET),
            field(keys::REFRESH_TOKEN),
        ),
        AuthMode::WorkforceIdentity => {
            AuthStrategy::workforce_identity(field(keys::CREDENTIAL_CONFIG_FILE))
        }
        AuthMode::WorkloadIdentity => {
            AuthStrategy::workload_identity(field(keys::CREDENTIAL_CONFIG_FILE))
        }
        AuthMode::Emulator => Ok(AuthStrategy::Emulator),
    }
}

fn required(value: String, property: &str, mode: AuthMode) -> BigQueryResult<String> {
    if value.trim().is_empty() {
        return Err(BigQueryError::missing(
            property,
            format!("{} authentication", mode),
        ));
    }
    Ok(value)
}

// Debug is implemented by hand so secrets never reach logs
impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("key_path", &self.key_path)
            .finish()
    }
}

impl fmt::Debug for UserOAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserOAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for ExternalAccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalAccountConfig")
            .field("credential_config_file", &self.credential_config_file)
            .finish()
    }
}
