//! EC2 instance metadata (IAM role) credential provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::MetadataClient;
use crate::credential::{CredentialMetadata, Credentials};
use crate::provider::CredentialProvider;
use crate::refresh::{RefreshableCredentials, refresh_fn};
use crate::{Error, Result};

const METADATA_ENDPOINT: &str = "http://169.254.169.254";
const ROLES_PATH: &str = "/latest/meta-data/iam/security-credentials/";

/// Credential document served for an instance role.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleMetadata {
    #[serde(default)]
    pub code: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub token: String,
    pub expiration: String,
}

impl RoleMetadata {
    fn into_credential_metadata(self, role_name: &str) -> CredentialMetadata {
        CredentialMetadata::new(
            self.access_key_id,
            self.secret_access_key,
            Some(self.token),
            self.expiration,
        )
        .with_role_name(role_name)
    }
}

/// Source of instance role credentials.
#[async_trait]
pub trait IamRoleFetcher: Send + Sync {
    /// Credentials of the instance role, or `None` if there is none.
    async fn retrieve_iam_role_credentials(&self) -> Result<Option<CredentialMetadata>>;
}

/// Fetches role credentials from the instance metadata service.
#[derive(Clone, Debug)]
pub struct InstanceMetadataFetcher {
    http: MetadataClient,
    base_url: String,
}

impl Default for InstanceMetadataFetcher {
    fn default() -> Self {
        Self {
            http: MetadataClient::default(),
            base_url: METADATA_ENDPOINT.to_string(),
        }
    }
}

impl InstanceMetadataFetcher {
    pub fn new(timeout: Duration, num_attempts: u32) -> Self {
        Self {
            http: MetadataClient::new(timeout, num_attempts),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Role name mapped to its credential document.
    ///
    /// Only the first listed role is fetched. Failures after the configured
    /// attempts, or a document missing required fields, give an empty map.
    pub async fn retrieve_iam_role_metadata(&self) -> HashMap<String, RoleMetadata> {
        let mut roles = HashMap::new();
        let url = format!("{}{}", self.base_url, ROLES_PATH);
        let listing = match self.http.get_text(&url, None).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!(error = %e, "Max number of attempts exceeded listing instance roles");
                return roles;
            }
        };
        let Some(role_name) = listing.lines().map(str::trim).find(|l| !l.is_empty()) else {
            tracing::debug!("Instance metadata lists no IAM role");
            return roles;
        };

        let document = match self.http.get_text(&format!("{url}{role_name}"), None).await {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!(role = role_name, error = %e, "Max number of attempts exceeded fetching role credentials");
                return roles;
            }
        };
        match serde_json::from_str::<RoleMetadata>(&document) {
            Ok(metadata) => {
                roles.insert(role_name.to_string(), metadata);
            }
            Err(e) => {
                tracing::debug!(role = role_name, error = %e, "Unexpected instance role credential document");
            }
        }
        roles
    }
}

#[async_trait]
impl IamRoleFetcher for InstanceMetadataFetcher {
    async fn retrieve_iam_role_credentials(&self) -> Result<Option<CredentialMetadata>> {
        Ok(self
            .retrieve_iam_role_metadata()
            .await
            .into_iter()
            .next()
            .map(|(role, metadata)| metadata.into_credential_metadata(&role)))
    }
}

/// Provider for the credentials of the instance's IAM role.
pub struct InstanceMetadataProvider {
    fetcher: Arc<dyn IamRoleFetcher>,
}

impl Default for InstanceMetadataProvider {
    fn default() -> Self {
        Self::new(InstanceMetadataFetcher::default())
    }
}

impl InstanceMetadataProvider {
    pub const METHOD: &'static str = "iam-role";
    pub const CANONICAL_NAME: &'static str = "Ec2InstanceMetadata";

    pub fn new(fetcher: impl IamRoleFetcher + 'static) -> Self {
        Self::from_shared(Arc::new(fetcher))
    }

    pub fn from_shared(fetcher: Arc<dyn IamRoleFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl CredentialProvider for InstanceMetadataProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let Some(metadata) = self.fetcher.retrieve_iam_role_credentials().await? else {
            return Ok(None);
        };
        tracing::info!(role = ?metadata.role_name, "Found credentials from IAM Role");

        let fetcher = self.fetcher.clone();
        let refresh = refresh_fn(move || {
            let fetcher = fetcher.clone();
            async move {
                fetcher
                    .retrieve_iam_role_credentials()
                    .await?
                    .ok_or_else(|| {
                        Error::retrieval(Self::METHOD, "instance metadata returned no credentials")
                    })
            }
        });
        let creds = RefreshableCredentials::from_metadata(metadata, refresh, Self::METHOD)?;
        Ok(Some(creds.into()))
    }
}
