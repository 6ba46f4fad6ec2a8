//! Credential types.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::refresh::RefreshableCredentials;
use crate::{Error, Result};

/// Immutable point-in-time snapshot of a credential triple.
///
/// This is what a signer consumes. Equality compares the values.
#[derive(Clone)]
pub struct ReadOnlyCredentials {
    access_key: String,
    secret_key: SecretString,
    token: Option<SecretString>,
}

impl ReadOnlyCredentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: SecretString::from(secret_key.into()),
            token: token.map(SecretString::from),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret())
    }
}

impl PartialEq for ReadOnlyCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.access_key == other.access_key
            && self.secret_key() == other.secret_key()
            && self.token() == other.token()
    }
}

impl Eq for ReadOnlyCredentials {}

impl fmt::Debug for ReadOnlyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[redacted]")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[derive(Clone)]
enum Inner {
    Static(ReadOnlyCredentials),
    Refreshable(Arc<RefreshableCredentials>),
}

/// Credentials returned by a provider.
///
/// Either a fixed triple or a handle to a [`RefreshableCredentials`]. Clones
/// of a refreshable value share the same refresh state.
#[derive(Clone)]
pub struct Credentials {
    inner: Inner,
    method: String,
}

impl Credentials {
    /// Create static credentials.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        token: Option<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            inner: Inner::Static(ReadOnlyCredentials::new(access_key, secret_key, token)),
            method: method.into(),
        }
    }

    /// Tag an existing snapshot with `method`.
    pub fn from_frozen(frozen: ReadOnlyCredentials, method: impl Into<String>) -> Self {
        Self {
            inner: Inner::Static(frozen),
            method: method.into(),
        }
    }

    /// Wrap refreshable credentials.
    pub fn refreshable(credentials: RefreshableCredentials) -> Self {
        let method = credentials.method().to_string();
        Self {
            inner: Inner::Refreshable(Arc::new(credentials)),
            method,
        }
    }

    /// Where these credentials were found.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn is_refreshable(&self) -> bool {
        matches!(self.inner, Inner::Refreshable(_))
    }

    pub fn as_refreshable(&self) -> Option<&RefreshableCredentials> {
        match &self.inner {
            Inner::Static(_) => None,
            Inner::Refreshable(creds) => Some(creds),
        }
    }

    /// Get a consistent snapshot, refreshing first if needed.
    pub async fn get_frozen_credentials(&self) -> Result<ReadOnlyCredentials> {
        match &self.inner {
            Inner::Static(frozen) => Ok(frozen.clone()),
            Inner::Refreshable(creds) => creds.get_frozen_credentials().await,
        }
    }
}

impl From<RefreshableCredentials> for Credentials {
    fn from(credentials: RefreshableCredentials) -> Self {
        Self::refreshable(credentials)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Credentials");
        s.field("method", &self.method);
        match &self.inner {
            Inner::Static(frozen) => s.field("access_key", &frozen.access_key),
            Inner::Refreshable(_) => s.field("refreshable", &true),
        };
        s.finish()
    }
}

/// Output of a refresh function.
#[derive(Clone)]
pub struct CredentialMetadata {
    pub access_key: String,
    pub secret_key: String,
    pub token: Option<String>,
    /// ISO-8601 expiry timestamp.
    pub expiry_time: String,
    pub role_name: Option<String>,
}

impl CredentialMetadata {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        token: Option<String>,
        expiry_time: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            token,
            expiry_time: expiry_time.into(),
            role_name: None,
        }
    }

    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    /// Parsed expiry; a malformed timestamp is a retrieval error.
    pub fn expiry(&self, provider: &str) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.expiry_time).ok_or_else(|| {
            Error::retrieval(
                provider,
                format!("invalid expiry_time in credentials: {:?}", self.expiry_time),
            )
        })
    }

    pub fn frozen(&self) -> ReadOnlyCredentials {
        ReadOnlyCredentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            self.token.clone(),
        )
    }
}

impl fmt::Debug for CredentialMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialMetadata")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[redacted]")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("expiry_time", &self.expiry_time)
            .field("role_name", &self.role_name)
            .finish()
    }
}

/// Parse an expiry timestamp.
///
/// Accepts RFC 3339, a trailing literal `UTC`, and naive timestamps (taken as UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = value.strip_suffix("UTC").unwrap_or(value).trim_end();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Serialize a timestamp the way refresh functions report it.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
