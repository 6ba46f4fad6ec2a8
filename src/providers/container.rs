//! Container (ECS task role) credential provider.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::{Host, Url};

use super::http::MetadataClient;
use crate::credential::{CredentialMetadata, Credentials};
use crate::env::Env;
use crate::provider::CredentialProvider;
use crate::refresh::{RefreshableCredentials, refresh_fn};
use crate::{Error, Result};

const ENV_VAR: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
const ENV_VAR_FULL: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
const ENV_VAR_AUTH_TOKEN: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";
const CONTAINER_HOST: Ipv4Addr = Ipv4Addr::new(169, 254, 170, 2);
const DEFAULT_NUM_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,
}

#[derive(Clone, Debug)]
struct Endpoint {
    url: Url,
    auth_token: Option<String>,
}

/// Fetches task role credentials from the container credentials endpoint.
#[derive(Clone, Debug)]
pub struct ContainerProvider {
    env: Env,
    http: MetadataClient,
    relative_base: String,
}

impl ContainerProvider {
    pub const METHOD: &'static str = "container-role";
    pub const CANONICAL_NAME: &'static str = "EcsContainer";

    pub fn new(env: Env) -> Self {
        Self {
            env,
            http: MetadataClient::new(DEFAULT_TIMEOUT, DEFAULT_NUM_ATTEMPTS),
            relative_base: format!("http://{CONTAINER_HOST}"),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration, num_attempts: u32) -> Self {
        self.http = MetadataClient::new(timeout, num_attempts);
        self
    }

    /// Base that `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` is appended to.
    pub fn with_relative_base(mut self, base: impl Into<String>) -> Self {
        self.relative_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> Result<Option<Endpoint>> {
        if let Some(relative) = self.env.get_non_empty(ENV_VAR) {
            let url = parse_url(&format!("{}{}", self.relative_base, relative))?;
            return Ok(Some(Endpoint {
                url,
                auth_token: None,
            }));
        }
        let Some(full) = self.env.get_non_empty(ENV_VAR_FULL) else {
            return Ok(None);
        };
        let url = parse_url(&full)?;
        if !is_allowed_host(&url) {
            return Err(Error::invalid_config(format!(
                "Unsupported host in {ENV_VAR_FULL}: {}. Only loopback addresses and {CONTAINER_HOST} are allowed",
                url.host_str().unwrap_or_default()
            )));
        }
        Ok(Some(Endpoint {
            url,
            auth_token: self.env.get_non_empty(ENV_VAR_AUTH_TOKEN),
        }))
    }

    async fn fetch(http: &MetadataClient, endpoint: &Endpoint) -> Result<CredentialMetadata> {
        let header = endpoint
            .auth_token
            .as_deref()
            .map(|token| ("Authorization", token));
        let body = http
            .get_text(endpoint.url.as_str(), header)
            .await
            .map_err(|e| Error::retrieval(Self::METHOD, e.to_string()))?;
        let creds: ContainerCredentials = serde_json::from_str(&body).map_err(|e| {
            Error::retrieval(Self::METHOD, format!("unexpected credentials response: {e}"))
        })?;
        Ok(CredentialMetadata::new(
            creds.access_key_id,
            creds.secret_access_key,
            Some(creds.token),
            creds.expiration,
        ))
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::invalid_config(format!("invalid container credentials URI {raw:?}: {e}")))
}

fn is_allowed_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback() || ip == CONTAINER_HOST,
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[async_trait]
impl CredentialProvider for ContainerProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let Some(endpoint) = self.endpoint()? else {
            return Ok(None);
        };
        let metadata = Self::fetch(&self.http, &endpoint).await?;
        tracing::info!(url = %endpoint.url, "Found credentials from container endpoint");

        let http = self.http.clone();
        let refresh = refresh_fn(move || {
            let http = http.clone();
            let endpoint = endpoint.clone();
            async move { Self::fetch(&http, &endpoint).await }
        });
        let creds = RefreshableCredentials::from_metadata(metadata, refresh, Self::METHOD)?;
        Ok(Some(creds.into()))
    }
}
