//! Shared credentials file provider (`~/.aws/credentials`).

use std::path::PathBuf;

use async_trait::async_trait;

use super::{load_section, profile_credentials};
use crate::config::{IniParser, default_ini_parser};
use crate::credential::Credentials;
use crate::provider::CredentialProvider;
use crate::Result;

/// Reads static keys from one profile of the shared credentials file.
pub struct SharedCredentialProvider {
    path: PathBuf,
    profile: String,
    parser: IniParser,
}

impl SharedCredentialProvider {
    pub const METHOD: &'static str = "shared-credentials-file";
    pub const CANONICAL_NAME: &'static str = "SharedCredentials";

    pub fn new(path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            profile: profile.into(),
            parser: default_ini_parser(),
        }
    }

    pub fn with_parser(mut self, parser: IniParser) -> Self {
        self.parser = parser;
        self
    }
}

#[async_trait]
impl CredentialProvider for SharedCredentialProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let Some(section) = load_section(&self.parser, &self.path, &self.profile)? else {
            return Ok(None);
        };
        let creds = profile_credentials(&section, Self::METHOD)?;
        if creds.is_some() {
            tracing::info!(path = %self.path.display(), "Found credentials in shared credentials file");
        }
        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use crate::config::{Profile, Profiles};
    use crate::credential::ReadOnlyCredentials;
    use crate::Error;

    fn parser_returning(profiles: Profiles) -> IniParser {
        Arc::new(move |_: &Path| -> Result<Profiles> { Ok(profiles.clone()) })
    }

    fn profile(pairs: &[(&str, &str)]) -> Profile {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_credential_file_exists_default_profile() {
        let profiles = Profiles::from([(
            "default".to_string(),
            profile(&[
                ("aws_access_key_id", "foo"),
                ("aws_secret_access_key", "bar"),
                ("aws_session_token", "baz"),
            ]),
        )]);
        let provider = SharedCredentialProvider::new("c", "default")
            .with_parser(parser_returning(profiles));

        let creds = provider.load().await.unwrap().unwrap();
        assert_eq!(creds.method(), "shared-credentials-file");
        assert_eq!(
            creds.get_frozen_credentials().await.unwrap(),
            ReadOnlyCredentials::new("foo", "bar", Some("baz".into()))
        );
    }

    #[tokio::test]
    async fn test_partial_creds_raise_error() {
        let profiles = Profiles::from([(
            "default".to_string(),
            profile(&[("aws_access_key_id", "foo")]),
        )]);
        let provider = SharedCredentialProvider::new("c", "default")
            .with_parser(parser_returning(profiles));
        assert!(matches!(
            provider.load().await.unwrap_err(),
            Error::PartialCredentials { .. }
        ));
    }

    #[tokio::test]
    async fn test_credentials_file_exists_with_no_matching_profile() {
        let profiles = Profiles::from([(
            "default".to_string(),
            profile(&[("aws_access_key_id", "foo"), ("aws_secret_access_key", "bar")]),
        )]);
        let provider = SharedCredentialProvider::new("c", "dev")
            .with_parser(parser_returning(profiles));
        assert!(provider.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_credentials_file_does_not_exist_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SharedCredentialProvider::new(dir.path().join("credentials"), "default");
        assert!(provider.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parse_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(&path, "[default\n").unwrap();
        let provider = SharedCredentialProvider::new(path, "default");
        assert!(matches!(
            provider.load().await.unwrap_err(),
            Error::ConfigParse { .. }
        ));
    }
}
