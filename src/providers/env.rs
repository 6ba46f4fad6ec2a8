//! Environment variable credential provider.

use async_trait::async_trait;

use super::credential_pair;
use crate::credential::{CredentialMetadata, Credentials, parse_timestamp};
use crate::env::Env;
use crate::provider::CredentialProvider;
use crate::refresh::{RefreshableCredentials, refresh_fn};
use crate::{Error, Result};

const ACCESS_KEY: &str = "AWS_ACCESS_KEY_ID";
const SECRET_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const TOKENS: [&str; 2] = ["AWS_SECURITY_TOKEN", "AWS_SESSION_TOKEN"];
const EXPIRY_TIME: &str = "AWS_CREDENTIAL_EXPIRATION";

#[derive(Clone, Debug)]
struct VarMapping {
    access_key: String,
    secret_key: String,
    token: Vec<String>,
    expiry_time: String,
}

impl Default for VarMapping {
    fn default() -> Self {
        Self {
            access_key: ACCESS_KEY.to_string(),
            secret_key: SECRET_KEY.to_string(),
            token: TOKENS.iter().map(|t| t.to_string()).collect(),
            expiry_time: EXPIRY_TIME.to_string(),
        }
    }
}

/// Provider that reads credentials from environment variables.
///
/// Variable names can be overridden one at a time; the rest keep their
/// defaults. Empty values count as unset. When an expiration variable is
/// present the credentials are refreshable and a refresh re-reads the
/// environment.
#[derive(Clone, Debug, Default)]
pub struct EnvProvider {
    env: Env,
    mapping: VarMapping,
}

impl EnvProvider {
    pub const METHOD: &'static str = "env";
    pub const CANONICAL_NAME: &'static str = "Environment";

    pub fn new(env: Env) -> Self {
        Self {
            env,
            mapping: VarMapping::default(),
        }
    }

    pub fn with_access_key_var(mut self, var: impl Into<String>) -> Self {
        self.mapping.access_key = var.into();
        self
    }

    pub fn with_secret_key_var(mut self, var: impl Into<String>) -> Self {
        self.mapping.secret_key = var.into();
        self
    }

    /// Read the session token from `var` only.
    pub fn with_token_var(mut self, var: impl Into<String>) -> Self {
        self.mapping.token = vec![var.into()];
        self
    }

    pub fn with_expiry_time_var(mut self, var: impl Into<String>) -> Self {
        self.mapping.expiry_time = var.into();
        self
    }

    fn pair(&self) -> Result<Option<(String, String)>> {
        let m = &self.mapping;
        credential_pair(
            Self::METHOD,
            (m.access_key.as_str(), self.env.get_non_empty(&m.access_key)),
            (m.secret_key.as_str(), self.env.get_non_empty(&m.secret_key)),
        )
    }

    fn token(&self) -> Option<String> {
        let vars: Vec<&str> = self.mapping.token.iter().map(String::as_str).collect();
        self.env.get_with_fallbacks(&vars)
    }

    fn refreshed(&self) -> Result<CredentialMetadata> {
        let (access, secret) = self.pair()?.ok_or_else(|| {
            Error::retrieval(Self::METHOD, "credential variables are no longer set")
        })?;
        let expiry_time = self
            .env
            .get_non_empty(&self.mapping.expiry_time)
            .ok_or_else(|| {
                Error::retrieval(
                    Self::METHOD,
                    format!("{} is no longer set", self.mapping.expiry_time),
                )
            })?;
        Ok(CredentialMetadata::new(access, secret, self.token(), expiry_time))
    }
}

#[async_trait]
impl CredentialProvider for EnvProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let Some((access, secret)) = self.pair()? else {
            tracing::debug!("No credentials in environment variables");
            return Ok(None);
        };
        tracing::info!("Found credentials in environment variables.");

        let token = self.token();
        let Some(raw_expiry) = self.env.get_non_empty(&self.mapping.expiry_time) else {
            return Ok(Some(Credentials::new(access, secret, token, Self::METHOD)));
        };
        let expiry_time = parse_timestamp(&raw_expiry).ok_or_else(|| {
            Error::retrieval(
                Self::METHOD,
                format!("invalid {}: {raw_expiry:?}", self.mapping.expiry_time),
            )
        })?;

        let provider = self.clone();
        let refresh = refresh_fn(move || {
            let result = provider.refreshed();
            async move { result }
        });
        let creds =
            RefreshableCredentials::new(access, secret, token, expiry_time, refresh, Self::METHOD);
        Ok(Some(creds.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::credential::{ReadOnlyCredentials, format_timestamp};

    async fn frozen(provider: &EnvProvider) -> ReadOnlyCredentials {
        provider
            .load()
            .await
            .unwrap()
            .unwrap()
            .get_frozen_credentials()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_envvars_are_found_no_token() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
        ]));
        let creds = provider.load().await.unwrap().unwrap();
        assert_eq!(creds.method(), "env");
        assert!(!creds.is_refreshable());
        assert_eq!(
            creds.get_frozen_credentials().await.unwrap(),
            ReadOnlyCredentials::new("foo", "bar", None)
        );
    }

    #[tokio::test]
    async fn test_envvars_found_with_security_token() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
            ("AWS_SECURITY_TOKEN", "baz"),
        ]));
        assert_eq!(frozen(&provider).await.token(), Some("baz"));
    }

    #[tokio::test]
    async fn test_envvars_found_with_session_token() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
            ("AWS_SESSION_TOKEN", "baz"),
        ]));
        assert_eq!(frozen(&provider).await.token(), Some("baz"));
    }

    #[tokio::test]
    async fn test_envvars_not_found() {
        let provider = EnvProvider::new(Env::from_slice(&[]));
        assert!(provider.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_values_count_as_unset() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", ""),
            ("AWS_SECRET_ACCESS_KEY", ""),
        ]));
        assert!(provider.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_creds_is_an_error() {
        let provider = EnvProvider::new(Env::from_slice(&[("AWS_ACCESS_KEY_ID", "foo")]));
        let err = provider.load().await.unwrap_err();
        assert!(matches!(
            err,
            Error::PartialCredentials { ref cred_var, .. } if cred_var == "AWS_SECRET_ACCESS_KEY"
        ));

        let provider = EnvProvider::new(Env::from_slice(&[("AWS_SECRET_ACCESS_KEY", "bar")]));
        assert!(matches!(
            provider.load().await.unwrap_err(),
            Error::PartialCredentials { .. }
        ));
    }

    #[tokio::test]
    async fn test_can_override_env_var_mapping() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("FOO_ACCESS_KEY", "foo"),
            ("FOO_SECRET_KEY", "bar"),
            ("FOO_SESSION_TOKEN", "baz"),
        ]))
        .with_access_key_var("FOO_ACCESS_KEY")
        .with_secret_key_var("FOO_SECRET_KEY")
        .with_token_var("FOO_SESSION_TOKEN");
        assert_eq!(
            frozen(&provider).await,
            ReadOnlyCredentials::new("foo", "bar", Some("baz".into()))
        );
    }

    #[tokio::test]
    async fn test_can_override_partial_env_var_mapping() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
            ("FOO_SESSION_TOKEN", "baz"),
        ]))
        .with_token_var("FOO_SESSION_TOKEN");
        assert_eq!(
            frozen(&provider).await,
            ReadOnlyCredentials::new("foo", "bar", Some("baz".into()))
        );
    }

    #[tokio::test]
    async fn test_expiration_makes_credentials_refreshable() {
        let expiry = format_timestamp(Utc::now() + Duration::hours(2));
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
            ("AWS_SESSION_TOKEN", "baz"),
            ("AWS_CREDENTIAL_EXPIRATION", expiry.as_str()),
        ]));
        let creds = provider.load().await.unwrap().unwrap();
        let refreshable = creds.as_refreshable().unwrap();
        assert!(!refreshable.refresh_needed(refreshable.thresholds().advisory));
        assert_eq!(creds.get_frozen_credentials().await.unwrap().access_key(), "foo");
    }

    #[tokio::test]
    async fn test_refresh_rereads_environment() {
        let expired = format_timestamp(Utc::now() - Duration::minutes(1));
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
            ("AWS_CREDENTIAL_EXPIRATION", expired.as_str()),
        ]));
        let creds = provider.load().await.unwrap().unwrap();

        // The environment still carries the expired timestamp.
        let err = creds.get_frozen_credentials().await.unwrap_err();
        assert!(err.to_string().contains("still expired"));
    }

    #[test]
    fn test_refresh_after_variables_removed_is_retrieval_failure() {
        let provider = EnvProvider::new(Env::from_slice(&[]));
        let err = provider.refreshed().unwrap_err();
        assert!(matches!(err, Error::RetrievalFailure { .. }));
        assert!(err.to_string().contains("no longer set"));
    }

    #[test]
    fn test_refresh_after_expiration_removed_is_retrieval_failure() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
        ]));
        let err = provider.refreshed().unwrap_err();
        assert!(matches!(err, Error::RetrievalFailure { .. }));
        assert!(err.to_string().contains("AWS_CREDENTIAL_EXPIRATION is no longer set"));
    }

    #[tokio::test]
    async fn test_malformed_expiration_is_an_error() {
        let provider = EnvProvider::new(Env::from_slice(&[
            ("AWS_ACCESS_KEY_ID", "foo"),
            ("AWS_SECRET_ACCESS_KEY", "bar"),
            ("AWS_CREDENTIAL_EXPIRATION", "later"),
        ]));
        assert!(matches!(
            provider.load().await.unwrap_err(),
            Error::RetrievalFailure { .. }
        ));
    }
}
