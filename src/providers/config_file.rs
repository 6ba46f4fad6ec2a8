//! Config file provider (`~/.aws/config`).

use std::path::PathBuf;

use async_trait::async_trait;

use super::{load_section, profile_credentials};
use crate::Result;
use crate::config::{IniParser, default_config_parser};
use crate::credential::Credentials;
use crate::provider::CredentialProvider;

/// Reads static keys from one profile of the config file.
///
/// The parser must already map `[profile name]` sections to `name`.
pub struct ConfigProvider {
    path: PathBuf,
    profile: String,
    parser: IniParser,
}

impl ConfigProvider {
    pub const METHOD: &'static str = "config-file";
    pub const CANONICAL_NAME: &'static str = "SharedConfig";

    pub fn new(path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            profile: profile.into(),
            parser: default_config_parser(),
        }
    }

    pub fn with_parser(mut self, parser: IniParser) -> Self {
        self.parser = parser;
        self
    }
}

#[async_trait]
impl CredentialProvider for ConfigProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let Some(section) = load_section(&self.parser, &self.path, &self.profile)? else {
            tracing::debug!(profile = %self.profile, "Profile not found in config file");
            return Ok(None);
        };
        let creds = profile_credentials(&section, Self::METHOD)?;
        if creds.is_some() {
            tracing::info!(path = %self.path.display(), "Credentials found in config file");
        }
        Ok(creds)
    }
}
