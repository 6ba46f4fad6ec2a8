//! Assume-role result memoization.
//!
//! The cache is an explicit object owned by whoever builds the resolver, so
//! its lifetime is that of the session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::sts::{AssumeRoleRequest, TemporaryCredentials};

/// Entries expiring sooner than this are treated as absent.
pub const LIVE_WINDOW: Duration = Duration::minutes(15);

#[derive(Serialize)]
struct CacheKey<'a> {
    profile: &'a str,
    base_access_key: &'a str,
    #[serde(flatten)]
    request: &'a AssumeRoleRequest,
}

/// Temporary credentials keyed by profile and role parameters.
///
/// Clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct AssumeRoleCache {
    entries: Arc<RwLock<HashMap<String, TemporaryCredentials>>>,
}

impl AssumeRoleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key covering every parameter that shapes the issued credentials.
    ///
    /// The MFA token code is one-time and is not part of the key; the device
    /// serial is.
    pub fn cache_key(
        profile: &str,
        base_access_key: &str,
        request: &AssumeRoleRequest,
    ) -> Result<String> {
        Ok(serde_json::to_string(&CacheKey {
            profile,
            base_access_key,
            request,
        })?)
    }

    /// Entry for `key` if it stays valid beyond the live window from `now`.
    pub async fn get_live(&self, key: &str, now: DateTime<Utc>) -> Option<TemporaryCredentials> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|creds| creds.expiration - now > LIVE_WINDOW)
            .cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, credentials: TemporaryCredentials) {
        self.entries.write().await.insert(key.into(), credentials);
    }
}
